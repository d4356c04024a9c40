//! Voice Input
//!
//! Push-to-talk wrapper over a platform speech recognizer. Only transcripts
//! the platform marks final reach the caller; interim results are dropped.
//!
//! States: idle → listening → idle (on toggle, error, or end of speech).
//! Without platform support the adapter is permanently disabled.
//!
//! A final transcript replaces the chat input; the user still sends it.
//!
//! ```rust,no_run
//! # use livsync::voice::{fill_input, SpeechRecognizer, VoiceInput};
//! # use livsync::{AppContext, Toaster};
//! # use std::sync::{Arc, Mutex};
//! # async fn run(context: &AppContext, recognizer: impl SpeechRecognizer) -> Result<(), Box<dyn std::error::Error>> {
//! let input = Arc::new(Mutex::new(String::new()));
//! let voice = VoiceInput::mount(recognizer, context.toaster().clone(), fill_input(Arc::clone(&input)));
//!
//! // later, when the user presses send
//! let mut text = std::mem::take(&mut *input.lock().unwrap());
//! context.chat()?.submit(&mut text).await?;
//! # drop(voice);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::toast::{Toast, Toaster};

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Speech recognition is not supported on this platform")]
    Unsupported,

    #[error("Microphone access denied")]
    PermissionDenied,

    #[error("Recognizer failed to start: {0}")]
    Start(String),
}

/// Recognition settings applied at mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    pub continuous: bool,
    pub interim_results: bool,
    pub lang: String,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            lang: "en-US".to_string(),
        }
    }
}

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn final_(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// Events delivered by the platform recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// All results of the session so far
    Result { results: Vec<RecognitionResult> },
    Error(String),
    /// Recognizer stopped on its own (silence, end of speech)
    End,
}

/// Platform speech recognition capability
pub trait SpeechRecognizer: Send {
    fn is_supported(&self) -> bool;

    fn configure(&mut self, settings: &RecognitionSettings);

    fn start(&mut self) -> Result<(), VoiceError>;

    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Listening,
    Unsupported,
}

/// Voice input widget state and its recognizer
pub struct VoiceInput<R: SpeechRecognizer> {
    recognizer: R,
    state: VoiceState,
    toaster: Toaster,
    on_transcript: Box<dyn FnMut(&str) + Send>,
}

impl<R: SpeechRecognizer> VoiceInput<R> {
    /// Set up the recognizer; unsupported platforms get one toast and stay disabled
    pub fn mount(
        mut recognizer: R,
        toaster: Toaster,
        on_transcript: impl FnMut(&str) + Send + 'static,
    ) -> Self {
        let state = if recognizer.is_supported() {
            recognizer.configure(&RecognitionSettings::default());
            VoiceState::Idle
        } else {
            toaster.show(Toast::error(
                "Voice input not supported",
                "Your platform doesn't support voice input",
            ));
            VoiceState::Unsupported
        };

        Self {
            recognizer,
            state,
            toaster,
            on_transcript: Box::new(on_transcript),
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == VoiceState::Listening
    }

    /// Start listening when idle, stop when listening
    pub fn toggle(&mut self) {
        match self.state {
            VoiceState::Unsupported => {}
            VoiceState::Listening => {
                self.recognizer.stop();
                self.state = VoiceState::Idle;
            }
            VoiceState::Idle => match self.recognizer.start() {
                Ok(()) => {
                    self.state = VoiceState::Listening;
                    self.toaster
                        .show(Toast::info("Listening...", "Speak now to add your task"));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Speech recognition failed to start");
                    self.toaster
                        .show(Toast::error("Voice input error", e.to_string()));
                }
            },
        }
    }

    /// Feed one recognizer event through the state machine
    pub fn handle_event(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Result { results } => {
                let is_final = results.last().map(|r| r.is_final).unwrap_or(false);
                if is_final {
                    let transcript: String =
                        results.iter().map(|r| r.transcript.as_str()).collect();
                    (self.on_transcript)(&transcript);
                }
            }
            RecognitionEvent::Error(error) => {
                tracing::error!(error = %error, "Speech recognition error");
                self.state = self.idle_state();
                self.toaster.show(Toast::error(
                    "Voice input error",
                    "Failed to process voice input",
                ));
            }
            RecognitionEvent::End => {
                self.state = self.idle_state();
            }
        }
    }

    fn idle_state(&self) -> VoiceState {
        match self.state {
            VoiceState::Unsupported => VoiceState::Unsupported,
            _ => VoiceState::Idle,
        }
    }
}

/// Transcript callback that replaces the contents of a shared chat input
pub fn fill_input(input: Arc<Mutex<String>>) -> impl FnMut(&str) + Send + 'static {
    move |transcript: &str| {
        let mut input = input.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        input.clear();
        input.push_str(transcript);
    }
}

impl<R: SpeechRecognizer> Drop for VoiceInput<R> {
    fn drop(&mut self) {
        if self.state == VoiceState::Listening {
            self.recognizer.stop();
        }
    }
}
