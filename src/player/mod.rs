//! Núcleo de reproducción por guild.
//!
//! Aquí vive la máquina de estados real del bot: la cola FIFO, el loop de
//! reproducción por guild, el registro proceso-global y la capa de control
//! por jerarquía de roles (override y votos de skip) que protege cada
//! operación mutante.

pub mod authority;
pub mod guild_player;
pub mod queue;
pub mod registry;
pub mod votes;

pub use guild_player::GuildPlayer;
pub use queue::TrackRequest;
pub use registry::PlayerRegistry;
