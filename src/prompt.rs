//! System prompt composition for the flight instructor relay.

use crate::models::chat::{ChatMessage, ChatMode, ChatRequest, DocumentContext};

pub const INSTRUCTOR_PROMPT: &str = "You are an AI Flight Instructor, an expert aviation technical assistant. \
You help pilots, aviation students and professionals understand aircraft systems, procedures and technical documentation.

Your expertise includes:
- Aircraft systems (hydraulics, electrical, pneumatics, avionics, flight controls)
- Normal and emergency procedures
- Performance calculations and limitations
- Regulatory requirements (FAA, EASA, ICAO)
- Aerodynamics and flight principles
- Aviation weather and meteorology
- Navigation systems and procedures

Guidelines:
- Give accurate, safety-focused answers using standard aviation terminology
- Describe procedures precisely and step by step
- Correct any potentially dangerous misunderstanding
- Point to the official aircraft documentation for critical procedures

Safety always comes first. When a specific aircraft configuration is uncertain, \
recommend the Aircraft Operating Manual (AOM) or Flight Crew Operating Manual (FCOM).";

const STUDY_GUIDE_PROMPT: &str = "The user has requested a study guide. Produce a comprehensive guide covering:
1. Key concepts and definitions
2. Important systems and their functions
3. Critical procedures to remember
4. Common exam questions with answers
5. Memory aids and mnemonics where helpful

Structure the guide with clear headers and bullet points.";

fn document_prompt(document: &DocumentContext) -> String {
    format!(
        "You are currently helping the user with the following document:\n\
         Title: {}\nAircraft: {}\nCategory: {}\n\n\
         Focus your responses on this aircraft and document when relevant.",
        document.title, document.aircraft, document.category
    )
}

pub fn system_prompt(mode: ChatMode, document: Option<&DocumentContext>) -> String {
    let mut prompt = INSTRUCTOR_PROMPT.to_string();

    if let Some(document) = document {
        prompt.push_str("\n\n");
        prompt.push_str(&document_prompt(document));
    }

    if mode == ChatMode::StudyGuide {
        prompt.push_str("\n\n");
        prompt.push_str(STUDY_GUIDE_PROMPT);
    }

    prompt
}

/// Conversation to send upstream: the system prompt followed by the request's messages.
pub fn compose_messages(request: &ChatRequest) -> Vec<ChatMessage> {
    let system = system_prompt(request.mode(), request.document_context.as_ref());

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::system(system));
    messages.extend(request.messages.iter().cloned());
    messages
}

/// Opening user message for a study-guide request.
pub fn study_guide_request(document: Option<&DocumentContext>) -> ChatMessage {
    let title = document
        .map(|d| d.title.as_str())
        .unwrap_or("aviation document");
    ChatMessage::user(format!(
        "Generate a comprehensive study guide for this {}. \
         Include key concepts, important procedures, and memory aids.",
        title
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;

    fn document() -> DocumentContext {
        DocumentContext {
            title: "B737 QRH".to_string(),
            aircraft: "Boeing 737".to_string(),
            category: "Checklist".to_string(),
        }
    }

    #[test]
    fn test_plain_prompt() {
        let prompt = system_prompt(ChatMode::Chat, None);
        assert_eq!(prompt, INSTRUCTOR_PROMPT);
    }

    #[test]
    fn test_document_and_study_guide_sections() {
        let doc = document();
        let prompt = system_prompt(ChatMode::StudyGuide, Some(&doc));

        assert!(prompt.starts_with(INSTRUCTOR_PROMPT));
        assert!(prompt.contains("Title: B737 QRH"));
        assert!(prompt.contains("Aircraft: Boeing 737"));
        assert!(prompt.contains("Category: Checklist"));
        assert!(prompt.ends_with(STUDY_GUIDE_PROMPT));
    }

    #[test]
    fn test_compose_messages_prepends_system() {
        let request = ChatRequest::new(vec![
            ChatMessage::user("What is Vmc?"),
            ChatMessage::assistant("Minimum control speed."),
            ChatMessage::user("Airborne or ground?"),
        ]);

        let messages = compose_messages(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1..], request.messages[..]);
    }

    #[test]
    fn test_study_guide_request_title() {
        let doc = document();
        assert!(study_guide_request(Some(&doc)).content.contains("this B737 QRH"));
        assert!(study_guide_request(None).content.contains("this aviation document"));
    }
}
