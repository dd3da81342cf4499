//! Mensajes y embeds que ven los usuarios.

pub mod embeds;
