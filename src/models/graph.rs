//! The live object graph: sessions, their messages and attachments, and the
//! global settings. Every place a blob can be referenced from is modelled as a
//! variant of [`BlobRef`], so walking the graph is exhaustive by construction.

use super::blob::BlobKey;
use serde::{Deserialize, Serialize};

/// Read-only snapshot of everything the application considers live.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveGraph {
    #[serde(default)]
    pub sessions: Vec<Session>,

    #[serde(default)]
    pub settings: Settings,
}

/// A chat session and its ordered messages.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub messages: Vec<Message>,

    /// Per-session assistant avatar.
    #[serde(default)]
    pub assistant_avatar_key: Option<BlobKey>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub pictures: Vec<PictureAttachment>,

    #[serde(default)]
    pub files: Vec<FileAttachment>,

    #[serde(default)]
    pub content_parts: Vec<ContentPart>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Other,
}

/// An image attached to a message.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PictureAttachment {
    #[serde(default)]
    pub storage_key: Option<BlobKey>,

    /// Remote URL, when the picture was never copied into the store.
    #[serde(default)]
    pub url: Option<String>,
}

/// A document attached to a message.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub file_type: Option<String>,

    #[serde(default)]
    pub storage_key: Option<BlobKey>,
}

/// One piece of a message body. Only image parts can reference a blob.
///
/// Part types this model does not know (tool calls and the like) collapse
/// into [`ContentPart::Other`] and contribute no references.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text {
        #[serde(default)]
        text: String,
    },
    Image {
        #[serde(default, rename = "storageKey")]
        storage_key: Option<BlobKey>,
    },
    Info {
        #[serde(default)]
        text: String,
    },
    Reasoning {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Global application settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub user_avatar_key: Option<BlobKey>,

    #[serde(default)]
    pub default_assistant_avatar_key: Option<BlobKey>,
}

/// Every slot in the graph that may hold a blob key.
///
/// A new attachment kind must get a variant here; the match in
/// [`BlobRef::storage_key`] then forces the collector to handle it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlobRef<'a> {
    Picture(&'a PictureAttachment),
    File(&'a FileAttachment),
    ImagePart(Option<&'a BlobKey>),
    AssistantAvatar(Option<&'a BlobKey>),
    UserAvatar(Option<&'a BlobKey>),
    DefaultAssistantAvatar(Option<&'a BlobKey>),
}

impl<'a> BlobRef<'a> {
    /// The referenced key, or `None` when the slot is unset or empty.
    pub fn storage_key(&self) -> Option<&'a BlobKey> {
        let key = match *self {
            BlobRef::Picture(pic) => pic.storage_key.as_ref(),
            BlobRef::File(file) => file.storage_key.as_ref(),
            BlobRef::ImagePart(key)
            | BlobRef::AssistantAvatar(key)
            | BlobRef::UserAvatar(key)
            | BlobRef::DefaultAssistantAvatar(key) => key,
        };
        key.filter(|k| !k.is_empty())
    }
}

impl ContentPart {
    fn blob_ref(&self) -> Option<BlobRef<'_>> {
        match self {
            ContentPart::Image { storage_key } => Some(BlobRef::ImagePart(storage_key.as_ref())),
            ContentPart::Text { .. }
            | ContentPart::Info { .. }
            | ContentPart::Reasoning { .. }
            | ContentPart::Other => None,
        }
    }
}

impl Message {
    /// Pictures, files and image content parts, in that order.
    pub fn blob_refs(&self) -> impl Iterator<Item = BlobRef<'_>> {
        self.pictures
            .iter()
            .map(BlobRef::Picture)
            .chain(self.files.iter().map(BlobRef::File))
            .chain(self.content_parts.iter().filter_map(ContentPart::blob_ref))
    }
}

impl Session {
    pub fn avatar_refs(&self) -> impl Iterator<Item = BlobRef<'_>> {
        std::iter::once(BlobRef::AssistantAvatar(
            self.assistant_avatar_key.as_ref(),
        ))
    }
}

impl Settings {
    pub fn blob_refs(&self) -> impl Iterator<Item = BlobRef<'_>> {
        [
            BlobRef::UserAvatar(self.user_avatar_key.as_ref()),
            BlobRef::DefaultAssistantAvatar(self.default_assistant_avatar_key.as_ref()),
        ]
        .into_iter()
    }
}
