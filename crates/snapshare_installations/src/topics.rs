//! Notification category to provider topic mapping

use std::collections::HashMap;

use snapshare_config::PushConfig;

/// Maps notification categories to provider topics
///
/// A category with a configured topic is a global (default) category: every
/// user with push enabled for it is subscribed on each of their devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicMap {
    topics: HashMap<String, String>,
}

impl TopicMap {
    pub fn new(topics: HashMap<String, String>) -> Self {
        Self { topics }
    }

    pub fn from_config(config: &PushConfig) -> Self {
        Self::new(config.topics.clone())
    }

    /// The provider topic for a category, if it has one.
    pub fn topic_for(&self, category: &str) -> Option<&str> {
        self.topics.get(category).map(String::as_str)
    }

    pub fn is_global(&self, category: &str) -> bool {
        self.topics.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TopicMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_lookup() {
        let topics: TopicMap = [("comments", "topic/comments")].into_iter().collect();

        assert_eq!(topics.topic_for("comments"), Some("topic/comments"));
        assert_eq!(topics.topic_for("digest"), None);
        assert!(topics.is_global("comments"));
        assert!(!topics.is_global("digest"));
    }

    #[test]
    fn test_from_config() {
        let mut config = PushConfig::default();
        config
            .topics
            .insert("likes".to_string(), "topic/likes".to_string());

        let topics = TopicMap::from_config(&config);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics.topic_for("likes"), Some("topic/likes"));
    }
}
