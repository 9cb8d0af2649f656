//! Conteo de votos para saltar la canción actual.

use serenity::model::id::UserId;
use std::collections::HashSet;

use crate::error::PlayerError;

/// Resultado de registrar un voto de skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteStatus {
    pub votes: usize,
    pub required: usize,
    pub skipped: bool,
}

/// Votos de skip acumulados para la canción actual.
///
/// El umbral se recalcula en cada voto a partir del número de presentes
/// (sin bots) que pasa el caller; nunca se cachea. El set se vacía en cada
/// transición de canción.
#[derive(Debug, Default)]
pub struct SkipVotes {
    voters: HashSet<UserId>,
}

impl SkipVotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Umbral de mayoría simple: floor(n * 0.5) + 1.
    pub fn required_votes(non_bot_listeners: usize) -> usize {
        non_bot_listeners / 2 + 1
    }

    /// Registra el voto de `actor`. Un voto repetido no altera el conteo.
    pub fn register(
        &mut self,
        actor: UserId,
        non_bot_listeners: usize,
    ) -> Result<VoteStatus, PlayerError> {
        if !self.voters.insert(actor) {
            return Err(PlayerError::AlreadyVoted);
        }

        let required = Self::required_votes(non_bot_listeners);
        let votes = self.voters.len();

        Ok(VoteStatus {
            votes,
            required,
            skipped: votes >= required,
        })
    }

    pub fn clear(&mut self) {
        self.voters.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.voters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user(id: u64) -> UserId {
        UserId::new(id)
    }

    #[test]
    fn test_required_votes_table() {
        assert_eq!(SkipVotes::required_votes(1), 1);
        assert_eq!(SkipVotes::required_votes(2), 2);
        assert_eq!(SkipVotes::required_votes(3), 2);
        assert_eq!(SkipVotes::required_votes(4), 3);
        assert_eq!(SkipVotes::required_votes(5), 3);
    }

    #[test]
    fn test_vote_reaches_threshold() {
        let mut votes = SkipVotes::new();

        // 3 presentes -> se necesitan 2 votos
        let first = votes.register(user(1), 3).unwrap();
        assert_eq!(
            first,
            VoteStatus {
                votes: 1,
                required: 2,
                skipped: false
            }
        );

        let second = votes.register(user(2), 3).unwrap();
        assert!(second.skipped);
        assert_eq!(second.votes, 2);
    }

    #[test]
    fn test_duplicate_vote_rejected() {
        let mut votes = SkipVotes::new();

        votes.register(user(1), 5).unwrap();
        let repeat = votes.register(user(1), 5);

        assert!(matches!(repeat, Err(PlayerError::AlreadyVoted)));
        assert_eq!(votes.len(), 1);
    }

    #[test]
    fn test_threshold_uses_live_listener_count() {
        let mut votes = SkipVotes::new();

        // Con 5 presentes el primer voto no alcanza
        let first = votes.register(user(1), 5).unwrap();
        assert!(!first.skipped);

        // Se fueron tres personas: el mismo conteo ahora sí alcanza
        let second = votes.register(user(2), 2).unwrap();
        assert!(second.skipped);
    }

    #[test]
    fn test_clear_resets_tally() {
        let mut votes = SkipVotes::new();
        votes.register(user(1), 5).unwrap();
        votes.register(user(2), 5).unwrap();

        votes.clear();
        assert_eq!(votes.len(), 0);

        // Tras limpiar, el mismo usuario puede volver a votar
        assert!(votes.register(user(1), 5).is_ok());
    }
}
