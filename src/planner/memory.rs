use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_MAX_EXCHANGES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub input: String,
    pub output: String,
}

/// Append-only log of one user's generator exchanges, trimmed from the front
/// once it holds more than `max_exchanges` entries.
#[derive(Debug)]
pub struct ConversationMemory {
    exchanges: VecDeque<Exchange>,
    max_exchanges: usize,
}

impl ConversationMemory {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            exchanges: VecDeque::new(),
            max_exchanges: max_exchanges.max(1),
        }
    }

    pub fn record(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.exchanges.push_back(Exchange {
            input: input.into(),
            output: output.into(),
        });
        while self.exchanges.len() > self.max_exchanges {
            self.exchanges.pop_front();
        }
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn transcript(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("Human: {}\nAI: {}", e.input, e.output))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Holding the lock for a whole generator call keeps one user's memory
/// reads and writes in order.
pub type MemoryHandle = Arc<Mutex<ConversationMemory>>;

/// Per-user conversation memories, created on first use.
pub struct MemoryStore {
    memories: DashMap<String, MemoryHandle>,
    max_exchanges: usize,
}

impl MemoryStore {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            memories: DashMap::new(),
            max_exchanges,
        }
    }

    pub fn get_or_create(&self, user_id: &str) -> MemoryHandle {
        self.memories
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationMemory::new(self.max_exchanges))))
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXCHANGES)
    }
}
