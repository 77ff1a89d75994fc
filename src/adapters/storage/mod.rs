//! Storage adapters.

mod in_memory_chat_messages;

pub use in_memory_chat_messages::InMemoryChatMessageRepository;
