//! In-process store
//!
//! Backs all three store traits with `DashMap`s. Used when no `DATABASE_URL` is
//! configured and by the service tests. Email uniqueness goes through the
//! entry API of the email index so concurrent registrations cannot both win.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::core::db::models::{Chatbot, Message, User};
use crate::core::db::store::{ChatbotStore, MessageStore, StoreError, UserStore};

const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
    chatbots: DashMap<Uuid, Chatbot>,
    messages: DashMap<Uuid, Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_chatbot(&self, id: Uuid) -> bool {
        self.messages.remove(&id);
        self.chatbots.remove(&id).is_some()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.emails.get(email).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn insert(&self, user: &User) -> Result<Uuid, StoreError> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict(EMAIL_CONSTRAINT.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        self.users.insert(user.id, user.clone());
        Ok(user.id)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let Some(previous_email) = self.users.get(&user.id).map(|u| u.email.clone()) else {
            return Ok(());
        };

        if previous_email != user.email {
            match self.emails.entry(user.email.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::Conflict(EMAIL_CONSTRAINT.to_string()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                }
            }
            self.emails.remove(&previous_email);
        }

        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(false);
        };
        self.emails.remove(&user.email);

        let owned: Vec<Uuid> = self
            .chatbots
            .iter()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        for chatbot_id in owned {
            self.remove_chatbot(chatbot_id);
        }

        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}

#[async_trait]
impl ChatbotStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Chatbot>, StoreError> {
        Ok(self.chatbots.get(&id).map(|c| c.value().clone()))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Chatbot>, StoreError> {
        let mut chatbots: Vec<Chatbot> = self
            .chatbots
            .iter()
            .filter(|c| c.user_id == owner_id)
            .map(|c| c.value().clone())
            .collect();
        chatbots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chatbots)
    }

    async fn insert(&self, chatbot: &Chatbot) -> Result<Uuid, StoreError> {
        self.chatbots.insert(chatbot.id, chatbot.clone());
        Ok(chatbot.id)
    }

    async fn update(&self, chatbot: &Chatbot) -> Result<bool, StoreError> {
        match self.chatbots.get_mut(&chatbot.id) {
            Some(mut stored) if stored.user_id == chatbot.user_id => {
                *stored = chatbot.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let owned = self
            .chatbots
            .get(&id)
            .is_some_and(|c| c.user_id == owner_id);
        if !owned {
            return Ok(false);
        }
        Ok(self.remove_chatbot(id))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn find_by_chatbot(&self, chatbot_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let mut messages = self
            .messages
            .get(&chatbot_id)
            .map(|m| m.value().clone())
            .unwrap_or_default();
        // Stable sort keeps insertion order for equal timestamps
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn insert(&self, message: &Message) -> Result<Uuid, StoreError> {
        self.messages
            .entry(message.chatbot_id)
            .or_default()
            .push(message.clone());
        Ok(message.id)
    }
}
