//! Shared fixtures for crawl tests: a deterministic embedder and tenant
//! scaffolding over temp directories.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use tempfile::TempDir;

use docent::error::DocentError;
use docent::models::Embedder;
use docent::tenant::TenantContext;

pub const DIMS: usize = 16;

pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocentError> {
        let mut buckets = vec![0.0f32; DIMS];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            buckets[(hasher.finish() % DIMS as u64) as usize] += 1.0;
        }
        let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut buckets {
                *v /= norm;
            }
        } else {
            buckets[0] = 1.0;
        }
        Ok(buckets)
    }
}

pub struct TenantFixture {
    pub ctx: TenantContext,
    _vector_dir: TempDir,
    _record_dir: TempDir,
}

impl TenantFixture {
    pub fn new(resource_id: &str) -> Self {
        let vector_dir = TempDir::new().unwrap();
        let record_dir = TempDir::new().unwrap();
        let uri = format!(
            "sqlite://{}?mode=rwc",
            record_dir.path().join("records.db").display()
        );
        let ctx =
            TenantContext::new(resource_id, vector_dir.path().to_string_lossy(), uri).unwrap();
        Self {
            ctx,
            _vector_dir: vector_dir,
            _record_dir: record_dir,
        }
    }
}

/// Page body with enough clean, varied text to clear the chunker floor.
pub const LONG_PAGE: &str = r#"<!doctype html>
<html>
<head><title>Acme Robotics</title></head>
<body>
  <main>
    <p>Acme Robotics designs autonomous mobile robots for warehouse logistics teams across Europe and North America.</p>
    <p>The engineering group in Lisbon builds the navigation stack, the perception pipeline, and the fleet coordination service.</p>
    <p>Customers report double digit throughput gains within the first quarter of their production deployment.</p>
  </main>
  <a href="/about">About us</a>
</body>
</html>"#;

pub const LONG_PAGE_EDITED: &str = r#"<!doctype html>
<html>
<head><title>Acme Robotics</title></head>
<body>
  <main>
    <p>Acme Robotics designs autonomous mobile robots for warehouse logistics teams across Europe and North America.</p>
    <p>The engineering group in Lisbon builds the navigation stack, the perception pipeline, and the fleet coordination service.</p>
    <p>The updated roadmap introduces cold storage support and a revised battery exchange routine for longer shifts.</p>
  </main>
  <a href="/about">About us</a>
</body>
</html>"#;

pub const ABOUT_PAGE: &str = r#"<!doctype html>
<html>
<head><title>About Acme</title></head>
<body>
  <main>
    <p>The company story began when three logistics engineers grew tired of manual picking routes and slow seasonal scaling.</p>
    <p>Their first prototype navigated a rented warehouse overnight without a single collision or manual intervention event.</p>
    <p>Today the platform coordinates hundreds of robots while staying fully observable to the operations teams that run it.</p>
  </main>
</body>
</html>"#;
