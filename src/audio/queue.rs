use std::{collections::VecDeque, fmt};
use tracing::{debug, info};

use crate::error::{MusicError, MusicResult};

/// Opaque reference to a playable source.
///
/// Never parsed here; the transcoder receives it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRef(String);

impl TrackRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackRef {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

impl From<String> for TrackRef {
    fn from(reference: String) -> Self {
        Self(reference)
    }
}

/// FIFO de tracks pendientes. Never holds the track that is currently loaded.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<TrackRef>,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola y devuelve el nuevo tamaño
    pub fn add_track(&mut self, track: TrackRef) -> usize {
        info!("➕ Agregado a la cola: {}", track);
        self.items.push_back(track);
        self.items.len()
    }

    /// Obtiene el siguiente track (FIFO)
    pub fn next_track(&mut self) -> Option<TrackRef> {
        let next = self.items.pop_front();
        match &next {
            Some(track) => debug!("➡️ Siguiente en cola: {}", track),
            None => debug!("📭 Cola vacía, no hay siguiente track"),
        }
        next
    }

    /// Puts a track back at the head, used when playback could not begin.
    pub fn push_front(&mut self, track: TrackRef) {
        self.items.push_front(track);
    }

    /// Elimina el track en `index` (base 0)
    pub fn remove_track(&mut self, index: usize) -> MusicResult<TrackRef> {
        let len = self.items.len();
        let removed = self
            .items
            .remove(index)
            .ok_or(MusicError::IndexOutOfRange { index, len })?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(removed)
    }

    /// Limpia la cola, devuelve cuántos tracks había
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        info!("🗑️ Cola limpiada ({} tracks)", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tracks(&self) -> Vec<TrackRef> {
        self.items.iter().cloned().collect()
    }
}
