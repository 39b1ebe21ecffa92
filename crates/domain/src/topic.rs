use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Discussion topics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionTopic {
    pub id: String,
    pub title: String,
    pub status: TopicStatus,
    pub introduced_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduced_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Ordered discussion agenda for one room.
///
/// Invariant: at most one topic is `active` at any time. A room starts
/// with a single active topic equal to the room topic.
#[derive(Debug, Clone)]
pub struct TopicList {
    topics: Vec<DiscussionTopic>,
}

/// Compact progress view used by WELCOME payloads and exports.
#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub total: usize,
    pub completed: usize,
    pub active: Option<String>,
}

impl TopicList {
    pub fn new(initial_title: impl Into<String>) -> Self {
        Self {
            topics: vec![DiscussionTopic {
                id: uuid::Uuid::new_v4().to_string(),
                title: initial_title.into(),
                status: TopicStatus::Active,
                introduced_at: Utc::now(),
                introduced_by: None,
                completed_at: None,
            }],
        }
    }

    /// Add a pending topic; returns its id.
    pub fn add(&mut self, title: impl Into<String>, introduced_by: Option<String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.topics.push(DiscussionTopic {
            id: id.clone(),
            title: title.into(),
            status: TopicStatus::Pending,
            introduced_at: Utc::now(),
            introduced_by,
            completed_at: None,
        });
        id
    }

    /// Activate `id`, completing whichever topic was active before.
    pub fn set_active(&mut self, id: &str) -> Result<()> {
        if !self.topics.iter().any(|t| t.id == id) {
            return Err(Error::addressing("topic", id));
        }
        let now = Utc::now();
        for topic in &mut self.topics {
            if topic.status == TopicStatus::Active && topic.id != id {
                topic.status = TopicStatus::Completed;
                topic.completed_at = Some(now);
            }
        }
        let topic = self.topics.iter_mut().find(|t| t.id == id).expect("checked above");
        if topic.status != TopicStatus::Active {
            topic.status = TopicStatus::Active;
            topic.completed_at = None;
        }
        Ok(())
    }

    pub fn complete(&mut self, id: &str) -> Result<()> {
        let topic = self
            .topics
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::addressing("topic", id))?;
        if topic.status != TopicStatus::Completed {
            topic.status = TopicStatus::Completed;
            topic.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn active(&self) -> Option<&DiscussionTopic> {
        self.topics.iter().find(|t| t.status == TopicStatus::Active)
    }

    pub fn get(&self, id: &str) -> Option<&DiscussionTopic> {
        self.topics.iter().find(|t| t.id == id)
    }

    pub fn all(&self) -> &[DiscussionTopic] {
        &self.topics
    }

    pub fn summary(&self) -> TopicSummary {
        TopicSummary {
            total: self.topics.len(),
            completed: self
                .topics
                .iter()
                .filter(|t| t.status == TopicStatus::Completed)
                .count(),
            active: self.active().map(|t| t.title.clone()),
        }
    }
}
