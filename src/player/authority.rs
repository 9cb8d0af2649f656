//! Jerarquía de roles para el control del canal de voz.
//!
//! Todas las decisiones se toman sobre snapshots inmutables de los
//! presentes en el canal, tomados en el momento del comando. No hay
//! estado: cambios de rol concurrentes se tratan como check best-effort.

use serenity::model::id::UserId;

/// Snapshot de un miembro presente en el canal de voz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub user_id: UserId,
    pub is_bot: bool,
    /// Posición del rol más alto del miembro; sin roles = 0.
    pub top_role_rank: u16,
}

/// El autor del comando, con sus privilegios de guild resueltos.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: UserId,
    pub top_role_rank: u16,
    pub is_owner: bool,
    pub is_admin: bool,
}

/// Rango más alto entre los presentes, ignorando bots y al usuario excluido.
/// `None` si el actor está efectivamente solo con el bot.
pub fn highest_rank(participants: &[Participant], exclude: UserId) -> Option<u16> {
    participants
        .iter()
        .filter(|p| !p.is_bot && p.user_id != exclude)
        .map(|p| p.top_role_rank)
        .max()
}

/// Decide si el actor puede tomar el control del canal de voz.
///
/// Orden de la política:
/// 1. Dueño de la guild o administrador: siempre.
/// 2. Bot sin sesión de voz establecida: cualquiera puede iniciarla.
/// 3. Actor solo en el canal (sin contar bots): sí.
/// 4. Rango del actor ESTRICTAMENTE mayor que el más alto presente;
///    los empates no otorgan control.
pub fn can_override(actor: &Actor, connected: bool, participants: &[Participant]) -> bool {
    if actor.is_owner || actor.is_admin {
        return true;
    }

    if !connected {
        return true;
    }

    match highest_rank(participants, actor.user_id) {
        None => true,
        Some(rank) => actor.top_role_rank > rank,
    }
}

/// Guardia de inicio de votación de skip: un actor sin control no puede
/// siquiera abrir la votación mientras haya alguien con rango estrictamente
/// superior presente.
pub fn may_initiate_skip_vote(actor: &Actor, participants: &[Participant]) -> bool {
    if can_override(actor, true, participants) {
        return true;
    }

    match highest_rank(participants, actor.user_id) {
        Some(rank) => actor.top_role_rank >= rank,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64) -> UserId {
        UserId::new(id)
    }

    fn member(id: u64, rank: u16) -> Participant {
        Participant {
            user_id: user(id),
            is_bot: false,
            top_role_rank: rank,
        }
    }

    fn bot(id: u64, rank: u16) -> Participant {
        Participant {
            user_id: user(id),
            is_bot: true,
            top_role_rank: rank,
        }
    }

    fn actor(id: u64, rank: u16) -> Actor {
        Actor {
            user_id: user(id),
            top_role_rank: rank,
            is_owner: false,
            is_admin: false,
        }
    }

    #[test]
    fn test_owner_and_admin_always_override() {
        let others = vec![member(2, 99)];

        let owner = Actor {
            is_owner: true,
            ..actor(1, 0)
        };
        assert!(can_override(&owner, true, &others));

        let admin = Actor {
            is_admin: true,
            ..actor(1, 0)
        };
        assert!(can_override(&admin, true, &others));
    }

    #[test]
    fn test_unconnected_bot_allows_anyone() {
        let others = vec![member(2, 99)];
        assert!(can_override(&actor(1, 0), false, &others));
    }

    #[test]
    fn test_alone_with_bot_allows_control() {
        // Solo el actor y bots en el canal
        let present = vec![member(1, 3), bot(100, 255)];
        assert!(can_override(&actor(1, 3), true, &present));
    }

    #[test]
    fn test_strictly_higher_rank_overrides() {
        let present = vec![member(1, 5), member(2, 4), member(3, 2)];
        assert!(can_override(&actor(1, 5), true, &present));
    }

    #[test]
    fn test_equal_rank_does_not_override() {
        let present = vec![member(1, 5), member(2, 5)];
        assert!(!can_override(&actor(1, 5), true, &present));
    }

    #[test]
    fn test_lower_rank_does_not_override() {
        let present = vec![member(1, 2), member(2, 7)];
        assert!(!can_override(&actor(1, 2), true, &present));
    }

    #[test]
    fn test_bot_ranks_are_ignored() {
        // El bot con rango alto no cuenta para la comparación
        let present = vec![member(1, 3), member(2, 1), bot(100, 255)];
        assert!(can_override(&actor(1, 3), true, &present));
    }

    #[test]
    fn test_skip_vote_initiation_blocked_when_outranked() {
        let present = vec![member(1, 2), member(2, 7)];
        assert!(!may_initiate_skip_vote(&actor(1, 2), &present));
    }

    #[test]
    fn test_skip_vote_initiation_allowed_at_equal_rank() {
        // Empate: no hay control pero sí se puede abrir votación
        let present = vec![member(1, 5), member(2, 5)];
        let a = actor(1, 5);
        assert!(!can_override(&a, true, &present));
        assert!(may_initiate_skip_vote(&a, &present));
    }
}
