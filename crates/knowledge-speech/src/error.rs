use knowledge_core::error::KnowledgeError;
use knowledge_core::types::ErrorKind;

/// Errors from speech synthesis and capture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("{0} is not supported on this platform")]
    UnsupportedCapability(&'static str),

    #[error("no speech detected")]
    NoSpeechDetected,

    #[error("speech recognition error: {0}")]
    RecognitionError(String),

    #[error("a speech capture is already in progress")]
    CaptureInProgress,

    #[error("speech capture cancelled")]
    CaptureCancelled,
}

impl SpeechError {
    /// Map a platform recognition error code such as `"no-speech"` or `"network"`.
    pub fn from_recognition_code(code: &str) -> Self {
        match code {
            "no-speech" => SpeechError::NoSpeechDetected,
            other => SpeechError::RecognitionError(other.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SpeechError::UnsupportedCapability(_) => ErrorKind::UnsupportedCapability,
            SpeechError::NoSpeechDetected => ErrorKind::NoSpeechDetected,
            SpeechError::RecognitionError(_) => ErrorKind::RecognitionError,
            SpeechError::CaptureInProgress | SpeechError::CaptureCancelled => {
                ErrorKind::InvalidState
            }
        }
    }

    /// User-facing notification text, if this error warrants one.
    pub fn notice(&self) -> Option<String> {
        let text = match self {
            SpeechError::UnsupportedCapability("speech synthesis") => {
                "Text-to-speech is not supported on this platform"
            }
            SpeechError::UnsupportedCapability(_) => {
                "Voice input is not supported on this platform"
            }
            SpeechError::NoSpeechDetected => "I didn't hear anything. Please try speaking again.",
            SpeechError::RecognitionError(code) if code == "network" => {
                "Network error. Please check your connection."
            }
            SpeechError::RecognitionError(_) => "Couldn't understand speech. Please try again.",
            SpeechError::CaptureInProgress => "Already listening.",
            SpeechError::CaptureCancelled => return None,
        };
        Some(text.to_string())
    }
}

impl From<SpeechError> for KnowledgeError {
    fn from(err: SpeechError) -> Self {
        KnowledgeError::Speech(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_codes() {
        assert_eq!(SpeechError::from_recognition_code("no-speech"), SpeechError::NoSpeechDetected);
        assert_eq!(
            SpeechError::from_recognition_code("audio-capture"),
            SpeechError::RecognitionError("audio-capture".to_string())
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            SpeechError::UnsupportedCapability("speech synthesis").kind(),
            ErrorKind::UnsupportedCapability
        );
        assert_eq!(SpeechError::NoSpeechDetected.kind(), ErrorKind::NoSpeechDetected);
        assert_eq!(
            SpeechError::RecognitionError("network".into()).kind(),
            ErrorKind::RecognitionError
        );
    }

    #[test]
    fn test_notices() {
        assert_eq!(
            SpeechError::from_recognition_code("network").notice().as_deref(),
            Some("Network error. Please check your connection.")
        );
        assert_eq!(
            SpeechError::from_recognition_code("aborted").notice().as_deref(),
            Some("Couldn't understand speech. Please try again.")
        );
        assert_eq!(
            SpeechError::UnsupportedCapability("speech synthesis").notice().as_deref(),
            Some("Text-to-speech is not supported on this platform")
        );
        assert!(SpeechError::CaptureCancelled.notice().is_none());
    }

    #[test]
    fn test_into_knowledge_error() {
        let err: KnowledgeError = SpeechError::NoSpeechDetected.into();
        assert!(matches!(err, KnowledgeError::Speech(_)));
    }
}
