//! Chat entry point and the conversational dispatch order.
//!
//! Dispatch, first match wins: location fast-path, name gate, lead-step
//! progress, inline contact submission, name prompt, pricing intent, then
//! retrieval + synthesis. The public entry never returns an error: any
//! internal failure becomes an apology string.

use tracing::{debug, error, info};

use super::Engine;
use crate::error::DocentError;
use crate::session::{LeadStep, SessionState};
use crate::validators;

const PRICING_KEYWORDS: &[&str] = &["price", "cost", "pricing", "quote", "rates", "how much"];

const APOLOGY: &str =
    "I apologize, but I encountered an error while processing your question. Please try again.";
const ASK_NAME: &str = "Before we continue, may I have your name please?";
const ASK_EMAIL_AFTER_PHONE: &str =
    "Great! I've saved your phone number. Could you please provide your email address?";
const EMAIL_SAVED: &str =
    "Perfect! I've saved your email address. We will contact you soon regarding your queries";
const ASK_PHONE_STEP: &str = "Great! Now, could you please provide your phone number?";
const ASK_EMAIL_STEP: &str = "Perfect! Finally, what's your email address?";
const THANKS_FALLBACK: &str = "Thank you! We'll follow up soon.";

impl Engine {
    /// Answers one message within a session.
    ///
    /// Side effects: mutates session state, writes lead records, and stores
    /// up to five source snippets for the session.
    pub async fn chat(&self, question: &str, session_id: &str) -> String {
        info!(session = session_id, "chat message received");

        // New question: previously surfaced sources no longer apply.
        self.sessions.with_session(session_id, |_, scratch| {
            scratch.last_sources.clear();
        });

        match self.chat_inner(question, session_id).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(session = session_id, error = %e, "chat dispatch failed");
                APOLOGY.to_string()
            }
        }
    }

    async fn chat_inner(&self, question: &str, session_id: &str) -> Result<String, DocentError> {
        // 1. Location fast-path: deterministic URL selection, no LLM.
        if location_query(question) {
            if let Some(answer) = self.answer_location_query(question).await {
                return Ok(answer);
            }
            debug!("location fast-path found no URL candidates; falling through");
        }

        // 2. Name gate.
        let awaiting_name = self
            .sessions
            .peek(session_id, |state, _| *state == SessionState::AwaitingName)
            .unwrap_or(false);
        if awaiting_name {
            return Ok(self.collect_name(question, session_id).await);
        }

        // 3. Lead-collection progress.
        let lead_state = self.sessions.peek(session_id, |state, _| state.clone());
        if let Some(SessionState::CollectingLead {
            step,
            name,
            phone,
            original_question,
        }) = lead_state
        {
            return Ok(self
                .advance_lead_step(session_id, question, step, name, phone, original_question)
                .await);
        }

        // 4. Inline contact submission. Only meaningful once a name was
        //    captured: there is no partial lead to attach the value to
        //    before that, and the name gate below runs first for fresh
        //    sessions.
        let username = self
            .sessions
            .peek(session_id, |_, scratch| scratch.username.clone())
            .flatten();
        if username.is_some() {
            if let Some(reply) = self.inline_contact(question, session_id).await {
                return Ok(reply);
            }
        }

        // 5. Name prompt for fresh sessions.
        let should_ask = username.is_none()
            && self
                .sessions
                .peek(session_id, |state, _| *state == SessionState::Unarmed)
                .unwrap_or(true);
        if should_ask {
            self.sessions.with_session(session_id, |state, _| {
                *state = SessionState::AwaitingName;
            });
            return Ok(ASK_NAME.to_string());
        }

        // 6. Pricing intent arms lead collection (phone first; the name is
        //    already captured).
        if pricing_inquiry(question) {
            let lead_collected = self
                .sessions
                .peek(session_id, |_, scratch| scratch.lead_collected)
                .unwrap_or(false);
            if !lead_collected {
                let prompt = self.sessions.with_session(session_id, |state, scratch| {
                    if scratch.original_pricing_question.is_none() {
                        scratch.original_pricing_question = Some(question.to_string());
                    }
                    let name = scratch.username.clone().unwrap_or_default();
                    *state = SessionState::CollectingLead {
                        step: LeadStep::Phone,
                        name: name.clone(),
                        phone: String::new(),
                        original_question: question.to_string(),
                    };
                    if name.is_empty() {
                        "I'd be happy to help with pricing! Could you please provide your phone number?".to_string()
                    } else {
                        format!("I'd be happy to help with pricing, {name}! Could you please provide your phone number?")
                    }
                });
                return Ok(prompt);
            }
            debug!(session = session_id, "lead already collected; answering pricing question normally");
        }

        // 7. Retrieval and synthesis.
        self.answer_with_retrieval(question, session_id).await
    }

    async fn collect_name(&self, input: &str, session_id: &str) -> String {
        match validators::validate_name(input) {
            Err(reason) => format!("{reason} Please provide a valid name."),
            Ok(name) => {
                // Persist the partial lead immediately; a storage hiccup
                // must not block the conversation.
                if let Err(e) = self.records.insert_partial_lead(session_id, &name).await {
                    error!(session = session_id, error = %e, "partial lead save failed");
                }
                self.sessions.with_session(session_id, |state, scratch| {
                    scratch.username = Some(name.clone());
                    *state = SessionState::Named;
                });
                format!("Hey there {name}! What would you like to know about?")
            }
        }
    }

    async fn advance_lead_step(
        &self,
        session_id: &str,
        input: &str,
        step: LeadStep,
        name: String,
        phone: String,
        original_question: String,
    ) -> String {
        match step {
            LeadStep::Name => match validators::validate_name(input) {
                Err(reason) => format!("{reason} Please try again."),
                Ok(valid) => {
                    self.sessions.with_session(session_id, |state, _| {
                        *state = SessionState::CollectingLead {
                            step: LeadStep::Phone,
                            name: valid.clone(),
                            phone: phone.clone(),
                            original_question: original_question.clone(),
                        };
                    });
                    ASK_PHONE_STEP.to_string()
                }
            },
            LeadStep::Phone => match validators::validate_phone(input) {
                Err(reason) => format!("{reason} Please try again."),
                Ok(valid) => {
                    self.sessions.with_session(session_id, |state, _| {
                        *state = SessionState::CollectingLead {
                            step: LeadStep::Email,
                            name: name.clone(),
                            phone: valid.clone(),
                            original_question: original_question.clone(),
                        };
                    });
                    ASK_EMAIL_STEP.to_string()
                }
            },
            LeadStep::Email => match validators::validate_email(input) {
                Err(reason) => format!("{reason} Please try again."),
                Ok(email) => {
                    let saved = self
                        .records
                        .complete_lead(session_id, &name, &phone, &email, &original_question)
                        .await;

                    // Terminal either way: never loop a session on the same
                    // persistence failure.
                    self.sessions.with_session(session_id, |state, scratch| {
                        scratch.lead_collected = true;
                        scratch.email = Some(email.clone());
                        if scratch.phone.is_none() && !phone.is_empty() {
                            scratch.phone = Some(phone.clone());
                        }
                        *state = SessionState::Complete;
                    });

                    match saved {
                        Ok(()) => {
                            info!(session = session_id, "lead completed");
                            format!(
                                "Thank you {name}! Your information has been saved. We'll follow up soon regarding your pricing inquiry."
                            )
                        }
                        Err(e) => {
                            error!(session = session_id, error = %e, "lead save failed");
                            THANKS_FALLBACK.to_string()
                        }
                    }
                }
            },
        }
    }

    /// Handles a phone or email pasted inline into a normal message.
    /// Returns `None` when the message carries no usable contact value.
    async fn inline_contact(&self, question: &str, session_id: &str) -> Option<String> {
        let info = self.contact.extract(question);
        if !info.has_contact() {
            return None;
        }

        let has_phone = self
            .sessions
            .peek(session_id, |_, scratch| scratch.phone.is_some())
            .unwrap_or(false);

        if let Some(phone) = info.phones.first() {
            if !has_phone {
                return Some(match validators::validate_phone(phone) {
                    Err(reason) => format!("{reason} Please try again."),
                    Ok(valid) => {
                        let original_question = self
                            .sessions
                            .peek(session_id, |_, scratch| {
                                scratch.original_pricing_question.clone()
                            })
                            .flatten()
                            .unwrap_or_else(|| question.to_string());
                        if let Err(e) = self
                            .records
                            .mark_phone_collected(session_id, &valid, &original_question)
                            .await
                        {
                            error!(session = session_id, error = %e, "phone update failed");
                        }
                        self.sessions.with_session(session_id, |_, scratch| {
                            scratch.phone = Some(valid.clone());
                        });
                        ASK_EMAIL_AFTER_PHONE.to_string()
                    }
                });
            }
        }

        if let Some(email) = info.emails.first() {
            return Some(match validators::validate_email(email) {
                Err(reason) => format!("{reason} Please try again."),
                Ok(valid) => {
                    let (name, phone, original_question) = self
                        .sessions
                        .peek(session_id, |_, scratch| {
                            (
                                scratch.username.clone().unwrap_or_default(),
                                scratch.phone.clone().unwrap_or_default(),
                                scratch.original_pricing_question.clone(),
                            )
                        })
                        .unwrap_or_default();
                    let original_question =
                        original_question.unwrap_or_else(|| question.to_string());
                    if let Err(e) = self
                        .records
                        .complete_lead(session_id, &name, &phone, &valid, &original_question)
                        .await
                    {
                        error!(session = session_id, error = %e, "email update failed");
                    }
                    self.sessions.with_session(session_id, |state, scratch| {
                        scratch.lead_collected = true;
                        scratch.email = Some(valid.clone());
                        *state = SessionState::Complete;
                    });
                    EMAIL_SAVED.to_string()
                }
            });
        }

        None
    }
}

/// Whether the question explicitly asks for a page location or link.
pub(crate) fn location_query(question: &str) -> bool {
    let q = question.to_lowercase();
    const TRIGGERS: &[&str] = &[
        "where is this",
        "which page",
        "source",
        "link",
        "url",
        "where did you get this",
        "about page",
        "where can i find",
        "what page",
        "page located",
    ];
    if TRIGGERS.iter().any(|t| q.contains(t)) {
        return true;
    }
    q.split_whitespace()
        .any(|w| matches!(w, "source" | "link" | "url"))
}

fn pricing_inquiry(question: &str) -> bool {
    let q = question.to_lowercase();
    PRICING_KEYWORDS.iter().any(|kw| q.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_trigger_phrases() {
        assert!(location_query("Where can I find your pricing page?"));
        assert!(location_query("what page talks about the company story?"));
        assert!(location_query("give me the URL"));
        assert!(!location_query("when was the company founded?"));
    }

    #[test]
    fn pricing_keywords() {
        assert!(pricing_inquiry("How much does enterprise cost?"));
        assert!(pricing_inquiry("send me a quote"));
        assert!(!pricing_inquiry("tell me about your mission"));
    }
}
