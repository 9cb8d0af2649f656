//! Estado de reproducción de una guild y su loop dedicado.
//!
//! Cada guild tiene exactamente un [`GuildPlayer`], propiedad del
//! [`PlayerRegistry`](crate::player::registry::PlayerRegistry), y una tarea
//! independiente ([`playback_loop`]) que drena la cola, delega la
//! reproducción en songbird y espera la señal de fin de pista. Los comandos
//! mutan el estado de forma concurrente con el loop; cada pieza va detrás
//! de su propio lock.

use parking_lot::Mutex;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PlayerError;
use crate::player::queue::{TrackQueue, TrackRequest};
use crate::player::registry::PlayerRegistry;
use crate::player::votes::{SkipVotes, VoteStatus};
use crate::ui::embeds;

pub struct GuildPlayer {
    guild_id: GuildId,
    queue: TrackQueue,
    current: Mutex<Option<TrackRequest>>,
    volume: Mutex<f32>,
    votes: Mutex<SkipVotes>,
    call: Mutex<Option<Arc<tokio::sync::Mutex<Call>>>>,
    voice_channel: Mutex<Option<ChannelId>>,
    track_handle: Mutex<Option<TrackHandle>>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    idle_timeout: Duration,
}

impl GuildPlayer {
    pub(crate) fn new(guild_id: GuildId, default_volume: f32, idle_timeout: Duration) -> Self {
        Self {
            guild_id,
            queue: TrackQueue::new(),
            current: Mutex::new(None),
            volume: Mutex::new(default_volume),
            votes: Mutex::new(SkipVotes::new()),
            call: Mutex::new(None),
            voice_channel: Mutex::new(None),
            track_handle: Mutex::new(None),
            loop_task: Mutex::new(None),
            idle_timeout,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    // --- Cola ---

    pub fn enqueue(&self, request: TrackRequest) {
        self.queue.push(request);
    }

    /// Pendientes en orden de reproducción (sin incluir la actual).
    pub fn pending(&self) -> Vec<TrackRequest> {
        self.queue.snapshot()
    }

    pub fn current(&self) -> Option<TrackRequest> {
        self.current.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.current.lock().is_some()
    }

    // --- Volumen ---

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    /// Fija el volumen como porcentaje 0–100. Fuera de rango se rechaza
    /// sin tocar el valor anterior; si hay una pista sonando se aplica en
    /// caliente.
    pub fn set_volume(&self, percent: i64) -> Result<f32, PlayerError> {
        if !(0..=100).contains(&percent) {
            return Err(PlayerError::InvalidVolume(percent));
        }

        let volume = percent as f32 / 100.0;
        *self.volume.lock() = volume;

        if let Some(handle) = self.track_handle.lock().as_ref() {
            let _ = handle.set_volume(volume);
        }

        Ok(volume)
    }

    // --- Votos de skip ---

    pub fn register_skip_vote(
        &self,
        actor: UserId,
        non_bot_listeners: usize,
    ) -> Result<VoteStatus, PlayerError> {
        self.votes.lock().register(actor, non_bot_listeners)
    }

    // --- Control de pista ---

    pub async fn pause(&self) -> Result<(), PlayerError> {
        let handle = self
            .track_handle
            .lock()
            .clone()
            .ok_or(PlayerError::NothingPlaying)?;

        let info = handle
            .get_info()
            .await
            .map_err(|e| PlayerError::Transport(e.to_string()))?;
        if info.playing != PlayMode::Play {
            return Err(PlayerError::NothingPlaying);
        }

        handle
            .pause()
            .map_err(|e| PlayerError::Transport(e.to_string()))?;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        let handle = self
            .track_handle
            .lock()
            .clone()
            .ok_or(PlayerError::NothingPaused)?;

        let info = handle
            .get_info()
            .await
            .map_err(|e| PlayerError::Transport(e.to_string()))?;
        if info.playing != PlayMode::Pause {
            return Err(PlayerError::NothingPaused);
        }

        handle
            .play()
            .map_err(|e| PlayerError::Transport(e.to_string()))?;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(())
    }

    /// Detiene la pista actual. El evento de fin resultante despierta al
    /// loop, que limpia `current` y los votos.
    pub fn stop_current(&self) -> Result<(), PlayerError> {
        let handle = self
            .track_handle
            .lock()
            .clone()
            .ok_or(PlayerError::NothingPlaying)?;

        handle
            .stop()
            .map_err(|e| PlayerError::Transport(e.to_string()))
    }

    // --- Sesión de voz ---

    pub fn set_call(&self, call: Arc<tokio::sync::Mutex<Call>>, channel: ChannelId) {
        *self.call.lock() = Some(call);
        *self.voice_channel.lock() = Some(channel);
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        *self.voice_channel.lock()
    }

    /// Sincroniza el canal registrado cuando a la sesión la mueven desde
    /// fuera (p. ej. un administrador arrastra al bot).
    pub fn update_voice_channel(&self, channel: Option<ChannelId>) {
        *self.voice_channel.lock() = channel;
    }

    pub fn is_connected(&self) -> bool {
        self.call.lock().is_some()
    }

    /// Suelta la sesión de voz. Solo el loop (timeout de inactividad) o el
    /// handler de leave llegan aquí.
    pub(crate) async fn disconnect(&self) -> Result<(), PlayerError> {
        let call = self.call.lock().take();
        *self.voice_channel.lock() = None;

        if let Some(call) = call {
            call.lock()
                .await
                .leave()
                .await
                .map_err(|e| PlayerError::Transport(e.to_string()))?;
        }

        Ok(())
    }

    /// Desmontaje explícito: cancela el loop donde sea que esté suspendido,
    /// detiene la pista y suelta la sesión de voz.
    pub(crate) async fn shutdown(&self) {
        if let Some(task) = self.loop_task.lock().take() {
            task.abort();
        }

        if let Some(handle) = self.track_handle.lock().take() {
            let _ = handle.stop();
        }

        self.finish_track();

        if let Err(e) = self.disconnect().await {
            debug!("Desconexión durante shutdown de guild {}: {}", self.guild_id, e);
        }
    }

    pub(crate) fn attach_loop(&self, task: JoinHandle<()>) {
        *self.loop_task.lock() = Some(task);
    }

    /// Transición Playing → Idle: limpia pista actual, handle y votos.
    pub(crate) fn finish_track(&self) {
        *self.current.lock() = None;
        *self.track_handle.lock() = None;
        self.votes.lock().clear();
    }

    /// Arranca la reproducción de `request` contra la sesión de voz.
    ///
    /// Devuelve un receptor que se completa exactamente una vez cuando la
    /// pista termina: fin normal, error del driver o stop externo.
    async fn start_track(
        &self,
        request: &TrackRequest,
    ) -> Result<oneshot::Receiver<()>, PlayerError> {
        let call = self.call.lock().clone().ok_or(PlayerError::NotConnected)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlayerError::Transport(e.to_string()))?;
        let input = Input::from(HttpRequest::new(client, request.stream_url.clone()));

        let (tx, rx) = oneshot::channel();
        let done = Arc::new(Mutex::new(Some(tx)));

        let handle = {
            let mut guard = call.lock().await;
            guard.play_input(input)
        };

        let _ = handle.set_volume(self.volume());

        // Fin y error del driver señalan lo mismo: la pista terminó
        for event in [TrackEvent::End, TrackEvent::Error] {
            let notifier = TrackDoneNotifier {
                guild_id: self.guild_id,
                done: done.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), notifier) {
                let _ = handle.stop();
                return Err(PlayerError::Transport(e.to_string()));
            }
        }

        *self.current.lock() = Some(request.clone());
        *self.track_handle.lock() = Some(handle);

        Ok(rx)
    }

    #[cfg(test)]
    pub(crate) fn set_current_for_test(&self, request: TrackRequest) {
        *self.current.lock() = Some(request);
    }

    #[cfg(test)]
    pub(crate) fn skip_vote_count_for_test(&self) -> usize {
        self.votes.lock().len()
    }
}

/// Loop cooperativo por guild: espera en la cola (acotado por el timeout de
/// inactividad), reproduce y se suspende hasta el fin de pista. El timeout
/// venciendo es su salida limpia: desconecta y se quita del registro.
pub(crate) async fn playback_loop(
    player: Arc<GuildPlayer>,
    registry: Arc<PlayerRegistry>,
    http: Arc<Http>,
) {
    info!("🎧 Loop de reproducción iniciado para guild {}", player.guild_id);

    loop {
        let request = match player.queue.recv_timeout(player.idle_timeout).await {
            Some(request) => request,
            None => {
                info!(
                    "💤 Sin actividad por {}s en guild {}, desconectando",
                    player.idle_timeout.as_secs(),
                    player.guild_id
                );

                if let Err(e) = player.disconnect().await {
                    warn!(
                        "Error al desconectar por inactividad en guild {}: {}",
                        player.guild_id, e
                    );
                }

                registry.remove(player.guild_id);
                return;
            }
        };

        let done = match player.start_track(&request).await {
            Ok(done) => done,
            Err(e) => {
                warn!(
                    "⚠️ No se pudo reproducir «{}» en guild {}: {}",
                    request.title, player.guild_id, e
                );
                let _ = request
                    .announce_channel
                    .send_message(&http, CreateMessage::new().content(e.user_message()))
                    .await;
                player.finish_track();
                continue;
            }
        };

        info!("🎵 Reproduciendo: {} (guild {})", request.title, player.guild_id);

        // Anuncio best-effort al canal del solicitante
        let announce = CreateMessage::new().embed(embeds::now_playing(&request));
        if let Err(e) = request.announce_channel.send_message(&http, announce).await {
            warn!(
                "No se pudo anunciar «{}» en guild {}: {}",
                request.title, player.guild_id, e
            );
        }

        // Suspendido hasta fin de pista, error o stop externo. Si el driver
        // descarta la pista (emisor dropeado) también continuamos.
        let _ = done.await;

        player.finish_track();
    }
}

/// Resuelve el oneshot de fin de pista exactamente una vez, venga el fin
/// por terminación normal, error del driver o stop.
struct TrackDoneNotifier {
    guild_id: GuildId,
    done: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[async_trait::async_trait]
impl VoiceEventHandler for TrackDoneNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in *tracks {
                if let PlayMode::Errored(e) = &state.playing {
                    warn!("⚠️ Error de reproducción en guild {}: {}", self.guild_id, e);
                }
            }
        }

        if let Some(tx) = self.done.lock().take() {
            let _ = tx.send(());
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn player() -> GuildPlayer {
        GuildPlayer::new(GuildId::new(1), 0.5, Duration::from_secs(300))
    }

    fn request(title: &str) -> TrackRequest {
        TrackRequest {
            title: title.to_string(),
            stream_url: format!("https://cdn.example/{title}"),
            webpage_url: format!("https://example.com/{title}"),
            requested_by: UserId::new(1),
            requested_by_name: "tester".to_string(),
            announce_channel: ChannelId::new(1),
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn test_volume_boundaries() {
        let player = player();

        assert_eq!(player.set_volume(0).unwrap(), 0.0);
        assert_eq!(player.set_volume(100).unwrap(), 1.0);
        assert_eq!(player.set_volume(73).unwrap(), 0.73);
    }

    #[test]
    fn test_invalid_volume_leaves_previous_value() {
        let player = player();
        player.set_volume(30).unwrap();

        assert!(matches!(
            player.set_volume(101),
            Err(PlayerError::InvalidVolume(101))
        ));
        assert!(matches!(
            player.set_volume(-1),
            Err(PlayerError::InvalidVolume(-1))
        ));
        assert_eq!(player.volume(), 0.3);
    }

    #[test]
    fn test_finish_track_clears_current_and_votes() {
        let player = player();

        player.set_current_for_test(request("a"));
        player.register_skip_vote(UserId::new(1), 3).unwrap();
        player.register_skip_vote(UserId::new(2), 3).unwrap();
        assert!(player.is_playing());
        assert_eq!(player.skip_vote_count_for_test(), 2);

        player.finish_track();

        assert!(!player.is_playing());
        assert_eq!(player.skip_vote_count_for_test(), 0);

        // Los votos nunca se arrastran a la siguiente pista
        player.set_current_for_test(request("b"));
        assert!(player.register_skip_vote(UserId::new(1), 3).is_ok());
    }

    #[test]
    fn test_control_without_track_is_rejected() {
        let player = player();
        assert!(matches!(
            player.stop_current(),
            Err(PlayerError::NothingPlaying)
        ));
    }

    #[test]
    fn test_enqueue_is_fifo() {
        let player = player();
        player.enqueue(request("a"));
        player.enqueue(request("b"));

        let titles: Vec<String> = player.pending().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }
}
