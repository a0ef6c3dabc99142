//! Relays chat messages to a hosted conversational AI, one conversation per sender,
//! seeded with a persona prompt rendered from a personal configuration document.

pub mod chatbot;
pub mod config;
pub mod openai;
pub mod persona;
