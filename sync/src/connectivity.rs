//! Connectivity signal plumbing.
//!
//! Connectivity is an injected capability rather than ambient state: the
//! host owns a [`ConnectivitySource`] and flips it as the environment goes
//! on- and offline; the coordinator holds [`ConnectivityEvents`] and reacts
//! to transitions. Tests drive a simulated source the same way.

use tokio::sync::watch;

/// Create a linked source/events pair with the given initial state.
pub fn connectivity(initially_online: bool) -> (ConnectivitySource, ConnectivityEvents) {
    let (tx, rx) = watch::channel(initially_online);
    (ConnectivitySource { tx }, ConnectivityEvents { rx })
}

/// Host-side handle that publishes connectivity transitions.
#[derive(Debug)]
pub struct ConnectivitySource {
    tx: watch::Sender<bool>,
}

impl ConnectivitySource {
    /// Publish the new connectivity state. Publishing the current state
    /// again is harmless; subscribers only see transitions.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|state| {
            let changed = *state != online;
            *state = online;
            changed
        });
    }

    /// Current state as last published.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Subscriber-side handle the coordinator watches.
#[derive(Debug, Clone)]
pub struct ConnectivityEvents {
    rx: watch::Receiver<bool>,
}

impl ConnectivityEvents {
    /// Current connectivity state.
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next transition and return the new state.
    ///
    /// Returns `None` once the source has been dropped.
    pub async fn changed(&mut self) -> Option<bool> {
        match self.rx.changed().await {
            Ok(()) => Some(*self.rx.borrow_and_update()),
            Err(_) => None,
        }
    }
}
