mod chat;
mod history;

pub use chat::InMemoryChatRepository;
pub use history::InMemoryHistoryRepository;
