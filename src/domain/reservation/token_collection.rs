use std::collections::{HashMap, hash_map};

use crate::domain::reservation::token::{ReservationToken, TokenId, TokenState};
use crate::domain::time::SimTime;
use crate::error::{Error, Result};

/// The signed tokens a solver currently honours, keyed by token id.
#[derive(Debug, Clone, Default)]
pub struct TokenCollection {
    tokens: HashMap<TokenId, ReservationToken>,
}

impl TokenCollection {
    pub fn new_empty() -> Self {
        TokenCollection { tokens: HashMap::new() }
    }

    /// Stores a signed token.
    pub fn insert(&mut self, token: ReservationToken) -> Result<()> {
        let id = token.get_id();
        if self.tokens.contains_key(&id) {
            return Err(Error::TokenAlreadySigned(id));
        }

        self.tokens.insert(id, token);
        Ok(())
    }

    /// Removes a token. A token can only be removed once; the ledger capacity it booked stays consumed.
    pub fn remove(&mut self, id: &TokenId) -> Result<ReservationToken> {
        self.tokens.remove(id).ok_or(Error::UnknownToken(*id))
    }

    pub fn contains(&self, id: &TokenId) -> bool {
        self.tokens.contains_key(id)
    }

    pub fn get(&self, id: &TokenId) -> Option<&ReservationToken> {
        self.tokens.get(id)
    }

    /// `true` iff the token is held and `valid_from <= time <= valid_to`.
    pub fn is_valid_for(&self, id: &TokenId, time: SimTime) -> bool {
        match self.tokens.get(id) {
            Some(token) => token.get_window().contains(time),
            None => false,
        }
    }

    /// Lifecycle state of `token` at `time` as seen by this collection.
    pub fn get_state(&self, token: &ReservationToken, time: SimTime) -> TokenState {
        if !token.is_signed() {
            return TokenState::Unsigned;
        }

        if !self.tokens.contains_key(&token.get_id()) {
            return TokenState::Removed;
        }

        if time > token.get_valid_to() { TokenState::Expired } else { TokenState::Signed }
    }

    /// Drops every token whose window ended before `time`.
    ///
    /// # Returns
    /// The number of removed tokens.
    pub fn remove_expired(&mut self, time: SimTime) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| token.get_valid_to() >= time);

        before - self.tokens.len()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, TokenId, ReservationToken> {
        self.tokens.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::{SolverId, VehicleId};
    use crate::domain::reservation::time_window::TimeWindow;
    use crate::domain::time::{default_start, seconds};

    fn signed_token(from: f64, to: f64) -> ReservationToken {
        let t = default_start();
        let window = TimeWindow::new(t + seconds(from), t + seconds(to)).unwrap();
        let mut token = ReservationToken::new_unsigned(VehicleId::default(), SolverId::default(), window, 10.0, 0.1, 5.0, 3);
        token.mark_signed();
        token
    }

    #[test]
    fn lifecycle_states() {
        let mut collection = TokenCollection::new_empty();
        let token = signed_token(0.0, 1.0);
        let t = default_start();

        collection.insert(token.clone()).unwrap();
        assert_eq!(collection.get_state(&token, t), TokenState::Signed);
        assert_eq!(collection.get_state(&token, t + seconds(1.5)), TokenState::Expired);
        assert!(collection.is_valid_for(&token.get_id(), t + seconds(1.0)));
        assert!(!collection.is_valid_for(&token.get_id(), t + seconds(1.01)));

        collection.remove(&token.get_id()).unwrap();
        assert_eq!(collection.get_state(&token, t), TokenState::Removed);
        assert!(matches!(collection.remove(&token.get_id()), Err(Error::UnknownToken(_))));
    }

    #[test]
    fn double_insert_is_rejected() {
        let mut collection = TokenCollection::new_empty();
        let token = signed_token(0.0, 1.0);

        collection.insert(token.clone()).unwrap();
        assert!(matches!(collection.insert(token), Err(Error::TokenAlreadySigned(_))));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn remove_expired_keeps_running_tokens() {
        let mut collection = TokenCollection::new_empty();
        collection.insert(signed_token(0.0, 1.0)).unwrap();
        collection.insert(signed_token(0.5, 3.0)).unwrap();

        assert_eq!(collection.remove_expired(default_start() + seconds(2.0)), 1);
        assert_eq!(collection.len(), 1);
    }
}
