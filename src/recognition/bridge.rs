use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};
use crate::recognition::response::parse_model_response;
use crate::recognition::{Recognition, RecognitionRequest, SemanticRecognizer};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external program that reads a JSON [`RecognitionRequest`] on
/// stdin and prints the model's answer on stdout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn spawn(&self) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AnalysisError::Recognition(format!(
                    "failed to start recognizer {}: {e}",
                    self.program.display()
                ))
            })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Writes the request on its own thread; a program that never reads stdin
/// must not hold up the timeout loop.
fn feed<W: Write + Send + 'static>(pipe: Option<W>, payload: Vec<u8>) {
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            if let Err(e) = pipe.write_all(&payload) {
                warn!(error = %e, "recognizer closed stdin early");
            }
        });
    }
}

impl SemanticRecognizer for CommandRecognizer {
    fn recognize(&self, request: &RecognitionRequest, timeout: Duration) -> Result<Recognition> {
        let started = Instant::now();
        let payload = serde_json::to_vec(request)?;
        let mut child = self.spawn()?;
        debug!(program = %self.program.display(), bytes = payload.len(), "recognizer started");

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        feed(child.stdin.take(), payload);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AnalysisError::RecognitionTimeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            return Err(AnalysisError::Recognition(format!(
                "recognizer exited with {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        let text = String::from_utf8_lossy(&stdout);
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "recognizer finished");
        parse_model_response(&text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandRecognizer {
        CommandRecognizer::new(PathBuf::from("sh")).with_args(vec!["-c".into(), script.into()])
    }

    #[test]
    fn parses_program_output() {
        let recognizer = shell("cat > /dev/null; echo '{\"field_mappings\": {\"姓名\": \"张三\"}}'");
        let recognition = recognizer
            .recognize(&RecognitionRequest::default(), Duration::from_secs(10))
            .expect("recognizer output");
        assert_eq!(recognition.labels["姓名"], "张三");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let err = shell("echo boom >&2; exit 3")
            .recognize(&RecognitionRequest::default(), Duration::from_secs(10))
            .expect_err("failing program");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn timeout_holds_when_program_ignores_a_large_request() {
        let request = RecognitionRequest {
            form_labels: (0..20_000).map(|i| format!("field label number {i}")).collect(),
            ..RecognitionRequest::default()
        };
        let started = Instant::now();
        let err = shell("sleep 3")
            .recognize(&request, Duration::from_millis(200))
            .expect_err("timeout");
        assert!(matches!(err, AnalysisError::RecognitionTimeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn slow_program_times_out() {
        let err = shell("sleep 5")
            .recognize(&RecognitionRequest::default(), Duration::from_millis(100))
            .expect_err("timeout");
        assert!(matches!(err, AnalysisError::RecognitionTimeout(_)));
    }
}
