use std::fmt;

use crate::api::{Attachment, MediaRef, QueueOptionPayload, QueueOptionRecord};
use crate::i18n::Translations;

/// Session-local identity of a node; survives the first save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Draft,
    Saved,
    Editing,
}

/// One chatbot menu option and its sub-options.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionNode {
    pub key: NodeKey,
    pub id: Option<i64>,
    pub title: String,
    pub message: String,
    /// 1-based position among siblings.
    pub option: u32,
    pub queue_id: i64,
    pub parent_id: Option<i64>,
    pub media_path: Option<String>,
    pub media_name: Option<String>,
    pub pending_attachment: Option<Attachment>,
    forward_queue_id: String,
    exit_chatbot: bool,
    pub children: Vec<OptionNode>,
    pub editing: bool,
    pub expanded: bool,
    pub children_loaded: bool,
}

impl OptionNode {
    pub fn draft(key: NodeKey, queue_id: i64, parent_id: Option<i64>, option: u32) -> Self {
        Self {
            key,
            id: None,
            title: String::new(),
            message: String::new(),
            option,
            queue_id,
            parent_id,
            media_path: None,
            media_name: None,
            pending_attachment: None,
            forward_queue_id: String::new(),
            exit_chatbot: false,
            children: Vec::new(),
            editing: true,
            expanded: false,
            children_loaded: false,
        }
    }

    pub fn from_record(key: NodeKey, record: QueueOptionRecord) -> Self {
        let mut node = Self {
            key,
            id: Some(record.id),
            title: record.title,
            message: record.message,
            option: record.option,
            queue_id: record.queue_id,
            parent_id: record.parent_id,
            media_path: record.media_path,
            media_name: record.media_name,
            pending_attachment: None,
            forward_queue_id: String::new(),
            exit_chatbot: record.exit_chatbot,
            children: Vec::new(),
            editing: false,
            expanded: false,
            children_loaded: false,
        };
        node.set_forward_queue(record.forward_queue_id);
        node
    }

    pub fn is_draft(&self) -> bool {
        self.id.is_none()
    }

    pub fn state(&self) -> NodeState {
        match (self.id, self.editing) {
            (None, _) => NodeState::Draft,
            (Some(_), true) => NodeState::Editing,
            (Some(_), false) => NodeState::Saved,
        }
    }

    pub fn exit_chatbot(&self) -> bool {
        self.exit_chatbot
    }

    /// Empty when the option does not forward anywhere.
    pub fn forward_queue_id(&self) -> &str {
        &self.forward_queue_id
    }

    pub fn set_exit_chatbot(&mut self, exit: bool) {
        self.exit_chatbot = exit;
        if exit {
            self.forward_queue_id.clear();
        }
    }

    pub fn set_forward_queue(&mut self, queue_id: impl Into<String>) {
        self.forward_queue_id = queue_id.into().trim().to_string();
        if !self.forward_queue_id.is_empty() {
            self.exit_chatbot = false;
        }
    }

    pub fn exit_switch_disabled(&self) -> bool {
        !self.forward_queue_id.is_empty() && !self.exit_chatbot
    }

    pub fn forward_selector_disabled(&self) -> bool {
        self.exit_chatbot && self.forward_queue_id.is_empty()
    }

    pub fn has_media(&self) -> bool {
        self.media_path.is_some()
    }

    pub fn payload(&self) -> QueueOptionPayload {
        QueueOptionPayload {
            title: self.title.clone(),
            message: self.message.clone(),
            option: self.option,
            queue_id: self.queue_id,
            parent_id: self.parent_id,
            forward_queue_id: if self.forward_queue_id.is_empty() {
                None
            } else {
                Some(self.forward_queue_id.clone())
            },
            exit_chatbot: self.exit_chatbot,
        }
    }

    pub fn store_media(&mut self, media: MediaRef) {
        self.media_path = Some(media.media_path);
        self.media_name = Some(media.media_name);
        self.pending_attachment = None;
    }

    pub fn clear_media(&mut self) {
        self.media_path = None;
        self.media_name = None;
    }

    pub fn display_title(&self, translations: &Translations) -> String {
        if self.title.trim().is_empty() {
            translations.t("queueOptions.untitled")
        } else {
            self.title.clone()
        }
    }
}
