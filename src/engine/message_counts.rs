use std::fmt;

#[derive(Debug, Default)]
pub struct MessageCounts {
    received: u64,
    sent: u64,
}

impl MessageCounts {
    pub fn new() -> Self {
        MessageCounts::default()
    }

    pub fn received(&self) -> u64 {
        self.received
    }
    pub fn increment_received(&mut self) {
        self.received += 1;
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
    pub fn increment_sent(&mut self) {
        self.sent += 1;
    }
}

impl fmt::Display for MessageCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sent={} received={}", self.sent, self.received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut counts = MessageCounts::new();
        counts.increment_received();
        counts.increment_received();
        counts.increment_sent();
        assert_eq!(counts.received(), 2);
        assert_eq!(counts.sent(), 1);
        assert_eq!(counts.to_string(), "sent=1 received=2");
    }
}
