//! Integration tests for the stemctl pipeline
//!
//! These tests run the real process runner against a generated shell script
//! that imitates the separator's command line, progress output and file
//! layout.

#![cfg(unix)]

use crossbeam_channel::unbounded;
use stemctl::config::Settings;
use stemctl::pipeline::Separator;
use stemctl::process::CancellationToken;
use stemctl::tool::ToolCommand;
use stemctl::types::PipelineStage;
use stemctl::{OutputFormat, ProgressEvent, SeparationRequest, StemKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Argument handling shared by every fake tool
const PRELUDE: &str = r#"
if [ "$1" = "--help" ]; then
    HELP_BODY
fi
input="$1"; shift
model=""; out=""; ext="wav"
while [ $# -gt 0 ]; do
    case "$1" in
        -n) model="$2"; shift 2 ;;
        -o) out="$2"; shift 2 ;;
        --mp3) ext="mp3"; shift ;;
        -d|-j|--shifts) shift 2 ;;
        *) shift ;;
    esac
done
name=$(basename "$input")
track="${name%.*}"
"#;

/// Progress output resembling the real tool
const PROGRESS: &str = r#"
echo "Selected model is a bag of 1 models. You will see that many progress bars per track." >&2
echo "Separating track $input" >&2
for p in 0 10 30 50 75 99 100; do
    printf '%3d%%|####      | %d/100 [00:01<00:02]\r' "$p" "$p" >&2
done
echo "" >&2
"#;

/// Write stems for `stages` into `$dir`
fn write_stems(stages: &str) -> String {
    format!(
        r#"
mkdir -p "$dir"
for s in {stages}; do
    printf '%s-%s' "$track" "$s" > "$dir/$s.$ext"
done
"#
    )
}

/// Test environment: input directory, temp root and a fake tool
struct Fixture {
    input_dir: TempDir,
    temp_root: TempDir,
    tool_dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            input_dir: TempDir::new().expect("Failed to create input temp dir"),
            temp_root: TempDir::new().expect("Failed to create work temp dir"),
            tool_dir: TempDir::new().expect("Failed to create tool temp dir"),
        }
    }

    /// Create an input file with a supported extension
    fn input(&self, name: &str) -> PathBuf {
        let path = self.input_dir.path().join(name);
        fs::write(&path, b"not really audio").expect("Failed to write input");
        path
    }

    /// Marker the fake tool touches when asked to separate
    fn spawn_marker(&self) -> PathBuf {
        self.tool_dir.path().join("separation-started")
    }

    /// Write a fake tool whose separation run executes `body`
    fn tool(&self, help_ok: bool, body: &str) -> ToolCommand {
        let help = if help_ok {
            "echo usage: demucs; exit 0"
        } else {
            "echo broken >&2; exit 1"
        };
        let script = format!(
            "{}\ntouch '{}'\n{}\n",
            PRELUDE.replace("HELP_BODY", help),
            self.spawn_marker().display(),
            body
        );
        let path = self.tool_dir.path().join("fake-demucs.sh");
        fs::write(&path, script).expect("Failed to write fake tool");

        // Run through sh so the freshly written file is never exec'd directly
        ToolCommand {
            program: "sh".to_string(),
            prefix_args: vec![path.to_string_lossy().into_owned()],
        }
    }

    fn settings(&self, tool: ToolCommand) -> Settings {
        Settings {
            tool,
            temp_root: self.temp_root.path().to_path_buf(),
            show_progress: false,
            ..Settings::default()
        }
    }

    /// True once every per-request work directory is gone
    fn temp_root_is_empty(&self) -> bool {
        fs::read_dir(self.temp_root.path())
            .expect("temp root readable")
            .next()
            .is_none()
    }
}

fn standard_tool_body() -> String {
    format!(
        "{}\ndir=\"$out/$model/$track\"\n{}\necho \"Separated tracks will be stored in $out\" >&2\nexit 0",
        PROGRESS,
        write_stems("drums bass other vocals")
    )
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_end_to_end_success() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let settings = fx.settings(fx.tool(true, &standard_tool_body()));

    let request = SeparationRequest::builder(&input)
        .model("4-stem")
        .format(OutputFormat::Wav)
        .build();

    let (tx, rx) = unbounded();
    let result = Separator::new(settings).separate(&request, Some(&tx));
    drop(tx);
    let events: Vec<ProgressEvent> = rx.iter().collect();

    assert!(result.success, "separation failed: {:?}", result.error);
    assert!(result.error.is_none());
    assert_eq!(result.output_dir, fx.input_dir.path());
    assert_eq!(result.stems.len(), 4);

    for (kind, stage) in [
        (StemKind::Drums, "drums"),
        (StemKind::Bass, "bass"),
        (StemKind::Vocals, "vocals"),
        (StemKind::Other, "other"),
    ] {
        let expected = fx.input_dir.path().join(format!("song_{}.wav", stage));
        assert_eq!(result.stems[&kind], expected);
        assert_eq!(
            fs::read_to_string(&expected).unwrap(),
            format!("song-{}", stage)
        );
    }

    assert!(fx.temp_root_is_empty(), "work directory should be removed");

    // Progress was interpreted from the tool's stderr
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Info { message } if message.starts_with("Separating track"))));
    assert!(events
        .iter()
        .any(|e| e.overall_percent() == Some(100)));

    let completed: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::StageComplete { stage, .. } => Some(stage.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec!["drums", "bass", "other", "vocals"]);
}

#[test]
fn test_stage_completion_is_ordered_before_next_stage() {
    let fx = Fixture::new();
    let input = fx.input("song.flac");
    let settings = fx.settings(fx.tool(true, &standard_tool_body()));
    let request = SeparationRequest::builder(&input).model("htdemucs").build();

    let (tx, rx) = unbounded();
    let result = Separator::new(settings).separate(&request, Some(&tx));
    drop(tx);
    assert!(result.success, "separation failed: {:?}", result.error);

    let events: Vec<ProgressEvent> = rx.iter().collect();
    let complete_3 = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::StageComplete { stage, .. } if stage.index == 3))
        .expect("stage 3 completes");
    let first_stage_4 = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::StageProgress { stage, .. } if stage.index == 4))
        .expect("stage 4 starts");
    assert!(complete_3 < first_stage_4);
}

#[test]
fn test_output_directory_override() {
    let fx = Fixture::new();
    let input = fx.input("track one.mp3");
    let out = TempDir::new().unwrap();
    let final_dir = out.path().join("stems");
    let settings = fx.settings(fx.tool(true, &standard_tool_body()));

    let request = SeparationRequest::builder(&input)
        .model("htdemucs")
        .output_dir(&final_dir)
        .build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(result.success, "separation failed: {:?}", result.error);
    assert_eq!(result.output_dir, final_dir);
    assert_eq!(
        file_names(&final_dir),
        vec![
            "track one_bass.wav",
            "track one_drums.wav",
            "track one_other.wav",
            "track one_vocals.wav"
        ]
    );
}

#[test]
fn test_six_stem_mp3() {
    let fx = Fixture::new();
    let input = fx.input("song.ogg");
    let body = format!(
        "{}\ndir=\"$out/$model/$track\"\n{}\nexit 0",
        PROGRESS,
        write_stems("drums bass other vocals guitar piano")
    );
    let settings = fx.settings(fx.tool(true, &body));

    let request = SeparationRequest::builder(&input)
        .model("htdemucs_6s")
        .format(OutputFormat::Mp3)
        .build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(result.success, "separation failed: {:?}", result.error);
    assert_eq!(result.stems.len(), 6);
    assert_eq!(
        result.stems[&StemKind::ElectricGuitar],
        fx.input_dir.path().join("song_guitar.mp3")
    );
    assert!(result.stems.contains_key(&StemKind::Piano));
    assert!(!result.stems.contains_key(&StemKind::AcousticGuitar));
}

#[test]
fn test_alternate_layout_is_found() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let body = format!(
        "dir=\"$out/separated/$model/$track\"\n{}\nexit 0",
        write_stems("drums bass other vocals")
    );
    let settings = fx.settings(fx.tool(true, &body));

    let request = SeparationRequest::builder(&input).model("mdx_q").build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(result.success, "separation failed: {:?}", result.error);
    assert_eq!(result.stems.len(), 4);
    assert!(fx.temp_root_is_empty());
}

#[test]
fn test_unexpected_layout_found_by_search() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let body = format!(
        "dir=\"$out/v5-output/renamed\"\n{}\nexit 0",
        write_stems("drums vocals")
    );
    let settings = fx.settings(fx.tool(true, &body));

    let request = SeparationRequest::builder(&input).model("htdemucs").build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(result.success, "separation failed: {:?}", result.error);
    assert_eq!(result.stems.len(), 2);
}

#[test]
fn test_tool_missing() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let settings = fx.settings(ToolCommand::new("stemctl-test-no-such-separator"));

    let request = SeparationRequest::builder(&input).model("4-stem").build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::ProbingTool));
    let message = result.error.unwrap();
    assert!(message.contains("pip install"), "no install guidance: {}", message);
    assert!(result.stems.is_empty());
    assert!(fx.temp_root_is_empty());
}

#[test]
fn test_failed_probe_never_spawns_separation() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let settings = fx.settings(fx.tool(false, &standard_tool_body()));

    let request = SeparationRequest::builder(&input).build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::ProbingTool));
    assert!(!fx.spawn_marker().exists(), "separation must not be started");
}

#[test]
fn test_invalid_input_never_spawns() {
    let fx = Fixture::new();
    let input = fx.input("song.aiff");
    let settings = fx.settings(fx.tool(true, &standard_tool_body()));

    let request = SeparationRequest::builder(&input).build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Validating));
    assert!(result.error.unwrap().contains("Unsupported"));
    assert!(!fx.spawn_marker().exists());
}

#[test]
fn test_nonzero_exit_carries_stderr() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let body = r#"
mkdir -p "$out/$model/$track"
echo "RuntimeError: CUDA out of memory" >&2
exit 2
"#;
    let settings = fx.settings(fx.tool(true, body));

    let request = SeparationRequest::builder(&input).build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Invoking));
    let message = result.error.unwrap();
    assert!(message.contains("code 2"), "{}", message);
    assert!(message.contains("CUDA out of memory"), "{}", message);
    assert!(fx.temp_root_is_empty());
}

#[test]
fn test_no_outputs_produced() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let body = format!("{}\nexit 0", PROGRESS);
    let settings = fx.settings(fx.tool(true, &body));

    let request = SeparationRequest::builder(&input).build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Locating));
    assert!(result.error.unwrap().contains("No output stems"));
    assert!(fx.temp_root_is_empty());
}

#[test]
fn test_timeout_kills_tool_and_cleans_up() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let body = format!(
        "dir=\"$out/$model/$track\"\n{}\nsleep 30\nexit 0",
        write_stems("drums")
    );
    let mut settings = fx.settings(fx.tool(true, &body));
    settings.separation_timeout = Some(Duration::from_millis(500));

    let request = SeparationRequest::builder(&input).build();
    let result = Separator::new(settings).separate(&request, None);

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Invoking));
    assert!(result.error.unwrap().contains("timed out"));
    assert!(result.elapsed < Duration::from_secs(20));
    assert!(fx.temp_root_is_empty());
}

#[test]
fn test_cancellation_kills_tool_and_cleans_up() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let settings = fx.settings(fx.tool(true, "sleep 30\nexit 0"));
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        let marker = fx.spawn_marker();
        thread::spawn(move || {
            // Wait until the separation run itself has started
            for _ in 0..200 {
                if marker.exists() {
                    break;
                }
                thread::sleep(Duration::from_millis(25));
            }
            token.cancel();
        })
    };

    let request = SeparationRequest::builder(&input).build();
    let result = Separator::new(settings)
        .with_cancellation(token)
        .separate(&request, None);
    canceller.join().unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("cancelled"));
    assert!(fx.temp_root_is_empty());
}

#[test]
fn test_rerun_overwrites_outputs() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let settings = fx.settings(fx.tool(true, &standard_tool_body()));
    let request = SeparationRequest::builder(&input).model("4-stem").build();
    let separator = Separator::new(settings);

    let first = separator.separate(&request, None);
    let snapshot: Vec<Vec<u8>> = first.stems.values().map(|p| fs::read(p).unwrap()).collect();
    let second = separator.separate(&request, None);
    let again: Vec<Vec<u8>> = second.stems.values().map(|p| fs::read(p).unwrap()).collect();

    assert!(first.success && second.success);
    assert_eq!(first.stems, second.stems);
    assert_eq!(snapshot, again);
    assert_eq!(
        file_names(fx.input_dir.path()),
        vec![
            "song.wav",
            "song_bass.wav",
            "song_drums.wav",
            "song_other.wav",
            "song_vocals.wav"
        ]
    );
}

#[test]
fn test_concurrent_requests_use_separate_work_dirs() {
    let fx = Fixture::new();
    let a = fx.input("a.wav");
    let b = fx.input("b.wav");
    let settings = fx.settings(fx.tool(true, &standard_tool_body()));
    let separator = Separator::new(settings);

    let (ra, rb) = thread::scope(|s| {
        let ha = s.spawn(|| separator.separate(&SeparationRequest::builder(&a).build(), None));
        let hb = s.spawn(|| separator.separate(&SeparationRequest::builder(&b).build(), None));
        (ha.join().unwrap(), hb.join().unwrap())
    });

    assert!(ra.success && rb.success);
    assert!(ra.stems[&StemKind::Drums].ends_with("a_drums.wav"));
    assert!(rb.stems[&StemKind::Drums].ends_with("b_drums.wav"));
    assert!(fx.temp_root_is_empty());
}

#[test]
fn test_manifest_written_for_result() {
    let fx = Fixture::new();
    let input = fx.input("song.wav");
    let settings = fx.settings(fx.tool(true, &standard_tool_body()));
    let request = SeparationRequest::builder(&input).build();
    let result = Separator::new(settings).separate(&request, None);
    assert!(result.success, "separation failed: {:?}", result.error);

    let manifest_path = fx.input_dir.path().join("song_stems.json");
    stemctl::export::write_manifest(&request, &result, &manifest_path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["model"], "htdemucs");
    assert_eq!(json["stems"].as_object().unwrap().len(), 4);
}
