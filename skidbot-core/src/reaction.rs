// ABOUTME: Decorative reply posted when a flagged member speaks
// ABOUTME: Uniform pick over a fixed icon set, plus a fixed image attachment

use rand::seq::SliceRandom;
use rand::Rng;

use crate::traits::{MessageReply, UserId};

pub const DEFAULT_ICONS: [&str; 16] = [
    "😂", "🤓", "😈", "🤡", "💀", "👾", "🎭", "👻", "🤖", "👽", "😹", "🙀", "🤤", "🥳", "🤯", "😜",
];

pub const DEFAULT_IMAGE_URL: &str = "https://i.imgur.com/ZbDUIA2.png";

pub const DEFAULT_LABEL: &str = "Average Skidder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionDeck {
    icons: Vec<String>,
    label: String,
    image_url: String,
}

impl Default for ReactionDeck {
    fn default() -> Self {
        Self {
            icons: DEFAULT_ICONS.iter().map(|s| s.to_string()).collect(),
            label: DEFAULT_LABEL.to_string(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
        }
    }
}

impl ReactionDeck {
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    pub fn icons(&self) -> &[String] {
        &self.icons
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    /// Reply to `author` with one icon chosen uniformly at random
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R, author: UserId) -> MessageReply {
        let icon = self.icons.choose(rng).map(String::as_str).unwrap_or_default();
        MessageReply {
            content: format!("{icon} **{}** {icon}", self.label),
            attachment_url: Some(self.image_url.clone()),
            mention: Some(author),
        }
    }
}
