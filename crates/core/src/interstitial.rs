//! Interstitial shown when geolocation consent is still undecided.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterstitialChoice {
    /// Go on to the native location prompt
    Allow,
    /// Continue without location
    Deny,
}

/// The UI surface of the interstitial: `{show, hide, on allow, on deny}`.
///
/// `choice` resolves with the first action the user takes after `show`.
pub trait Interstitial: Send + Sync {
    fn show(&self);
    fn hide(&self);
    fn choice(&self) -> BoxFuture<'_, InterstitialChoice>;
}

/// Owns the interstitial's visibility flag and guarantees that each
/// presentation is dismissed exactly once.
pub struct InterstitialController {
    surface: Arc<dyn Interstitial>,
    visible: AtomicBool,
}

impl std::fmt::Debug for InterstitialController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterstitialController")
            .field("visible", &self.is_visible())
            .finish_non_exhaustive()
    }
}

impl InterstitialController {
    pub fn new(surface: Arc<dyn Interstitial>) -> Self {
        Self {
            surface,
            visible: AtomicBool::new(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// Show the interstitial, wait for the user, hide it again.
    ///
    /// The interstitial is hidden even when the returned future is dropped
    /// before the user answers, so the next presentation starts fresh.
    pub async fn present(&self) -> InterstitialChoice {
        self.visible.store(true, Ordering::SeqCst);
        self.surface.show();
        let presentation = Presentation { controller: self };
        debug!("Interstitial shown, waiting for the user.");

        let choice = self.surface.choice().await;
        drop(presentation);
        debug!(?choice, "Interstitial answered.");
        choice
    }

    /// Hide the interstitial if it is showing. Returns whether anything was
    /// hidden; repeated calls are no-ops.
    pub fn dismiss(&self) -> bool {
        if self.visible.swap(false, Ordering::SeqCst) {
            self.surface.hide();
            true
        } else {
            false
        }
    }
}

/// Dismisses the interstitial when a presentation ends, however it ends.
struct Presentation<'a> {
    controller: &'a InterstitialController,
}

impl Drop for Presentation<'_> {
    fn drop(&mut self) {
        self.controller.dismiss();
    }
}

/// Event-driven interstitial for embedders that receive allow/deny as
/// separate callbacks (button handlers, IPC messages, tests).
///
/// Each `show` opens a fresh slot for one answer. The first `allow` or
/// `deny` fills it; later activations return `false` and change nothing.
/// If the slot is closed without an answer the choice counts as a denial.
/// `hide` closes any slot still open.
#[derive(Debug, Default)]
pub struct ChannelInterstitial {
    pending: Mutex<Option<oneshot::Sender<InterstitialChoice>>>,
    answer: Mutex<Option<oneshot::Receiver<InterstitialChoice>>>,
    visible: AtomicBool,
}

impl ChannelInterstitial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// Whether a presentation is waiting for the user.
    pub fn is_awaiting(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn allow(&self) -> bool {
        self.respond(InterstitialChoice::Allow)
    }

    pub fn deny(&self) -> bool {
        self.respond(InterstitialChoice::Deny)
    }

    fn respond(&self, choice: InterstitialChoice) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => sender.send(choice).is_ok(),
            None => {
                debug!(?choice, "Interstitial already answered, ignoring.");
                false
            }
        }
    }
}

impl Interstitial for ChannelInterstitial {
    fn show(&self) {
        let (sender, receiver) = oneshot::channel();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
        *self.answer.lock().unwrap_or_else(PoisonError::into_inner) = Some(receiver);
        self.visible.store(true, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.answer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.visible.store(false, Ordering::SeqCst);
    }

    fn choice(&self) -> BoxFuture<'_, InterstitialChoice> {
        let receiver = self
            .answer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        async move {
            match receiver {
                Some(receiver) => receiver.await.unwrap_or(InterstitialChoice::Deny),
                None => InterstitialChoice::Deny,
            }
        }
        .boxed()
    }
}
