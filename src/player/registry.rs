//! Registro proceso-global de reproductores por guild.

use dashmap::DashMap;
use serenity::http::Http;
use serenity::model::id::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::player::guild_player::{playback_loop, GuildPlayer};

/// Mapa guild → reproductor, con creación perezosa y libre de carreras.
///
/// La entrada de cada guild es la única dueña de su [`GuildPlayer`]; nadie
/// fuera de este módulo inserta ni borra entradas.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    default_volume: f32,
    idle_timeout: Duration,
}

impl PlayerRegistry {
    pub fn new(default_volume: f32, idle_timeout: Duration) -> Self {
        Self {
            players: DashMap::new(),
            default_volume,
            idle_timeout,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    /// Obtiene el reproductor de la guild, creándolo si no existe.
    ///
    /// La entry API de DashMap serializa creaciones concurrentes: gane quien
    /// gane, se arranca exactamente un loop de reproducción por guild.
    pub fn get_or_create(self: &Arc<Self>, guild_id: GuildId, http: Arc<Http>) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Creando reproductor para guild {}", guild_id);

                let player = Arc::new(GuildPlayer::new(
                    guild_id,
                    self.default_volume,
                    self.idle_timeout,
                ));
                let task = tokio::spawn(playback_loop(player.clone(), Arc::clone(self), http));
                player.attach_loop(task);

                player
            })
            .clone()
    }

    /// Quita la entrada de la guild. Lo llama únicamente el loop dueño (al
    /// vencer su timeout de inactividad) o [`destroy`](Self::destroy).
    pub(crate) fn remove(&self, guild_id: GuildId) -> bool {
        let removed = self.players.remove(&guild_id).is_some();
        if removed {
            info!("🗑️ Reproductor de guild {} eliminado del registro", guild_id);
        }
        removed
    }

    /// Desmontaje explícito (comando leave o bot expulsado): cancela el
    /// loop, detiene la pista, suelta la sesión de voz y quita la entrada.
    pub async fn destroy(&self, guild_id: GuildId) -> bool {
        match self.players.remove(&guild_id) {
            Some((_, player)) => {
                player.shutdown().await;
                info!("👋 Reproductor de guild {} destruido", guild_id);
                true
            }
            None => false,
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn http() -> Arc<Http> {
        Arc::new(Http::new(""))
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_yields_one_player() {
        let registry = Arc::new(PlayerRegistry::new(0.5, Duration::from_secs(60)));
        let guild = GuildId::new(7);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let http = http();
                tokio::spawn(async move { registry.get_or_create(guild, http) })
            })
            .collect();

        let players = futures::future::join_all(tasks).await;
        let first = players[0].as_ref().unwrap().clone();
        for player in &players {
            assert!(Arc::ptr_eq(&first, player.as_ref().unwrap()));
        }
        assert_eq!(registry.len(), 1);

        registry.destroy(guild).await;
    }

    #[tokio::test]
    async fn test_idle_timeout_removes_entry() {
        let registry = Arc::new(PlayerRegistry::new(0.5, Duration::from_millis(50)));
        let guild = GuildId::new(9);

        let player = registry.get_or_create(guild, http());
        assert!(registry.get(guild).is_some());

        // El loop debe vencer su espera, desconectar y quitarse solo
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(registry.get(guild).is_none());
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_destroy_cancels_loop_and_removes_entry() {
        let registry = Arc::new(PlayerRegistry::new(0.5, Duration::from_secs(60)));
        let guild = GuildId::new(11);

        registry.get_or_create(guild, http());
        assert!(registry.destroy(guild).await);
        assert!(registry.get(guild).is_none());

        // Destruir dos veces es inocuo
        assert!(!registry.destroy(guild).await);
    }

    #[tokio::test]
    async fn test_players_are_created_per_guild() {
        let registry = Arc::new(PlayerRegistry::new(0.5, Duration::from_secs(60)));

        let a = registry.get_or_create(GuildId::new(1), http());
        let b = registry.get_or_create(GuildId::new(2), http());

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);

        registry.destroy(GuildId::new(1)).await;
        registry.destroy(GuildId::new(2)).await;
    }
}
