//! PNG and PDF export through an external converter.
//!
//! The document is written to a temporary `.svg` that lives only as long as
//! the conversion; the converter is called as
//! `<command> <tmp.svg> --export-type=<fmt> -o <out> [size flag]`.

use crate::error::EditError;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use vd_core::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// Format from a file extension, case-insensitive.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ExportFormat::Png),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }
}

/// Output size. Only one flag is passed: width wins over height, height
/// over dpi.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExportOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub dpi: Option<f64>,
}

/// Converter arguments after the input file.
pub fn build_args(format: ExportFormat, out: &Path, opts: &ExportOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        format!("--export-type={}", format.name()).into(),
        "-o".into(),
        out.as_os_str().to_os_string(),
    ];
    let size = match (opts.width, opts.height, opts.dpi) {
        (Some(w), _, _) => Some(format!("--export-width={w}")),
        (None, Some(h), _) => Some(format!("--export-height={h}")),
        (None, None, Some(dpi)) => Some(format!("--export-dpi={dpi}")),
        _ => None,
    };
    args.extend(size.map(OsString::from));
    args
}

/// Export `doc` to `out`. The temporary SVG is removed whether or not the
/// converter succeeds.
pub fn export(
    doc: &Document,
    command: &str,
    format: ExportFormat,
    out: &Path,
    opts: &ExportOptions,
) -> Result<(), EditError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("vd-export-")
        .suffix(".svg")
        .tempfile()
        .map_err(|e| EditError::ExportFailed(format!("temporary file: {e}")))?;
    tmp.write_all(doc.to_svg().as_bytes())
        .and_then(|()| tmp.flush())
        .map_err(|e| EditError::ExportFailed(format!("temporary file: {e}")))?;

    let args = build_args(format, out, opts);
    log::debug!("export {} via {command} {args:?}", tmp.path().display());
    let output = Command::new(command)
        .arg(tmp.path())
        .args(&args)
        .output()
        .map_err(|e| EditError::ExportFailed(format!("{command}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::warn!("export failed: {command} exited with {}", output.status);
        return Err(EditError::ExportFailed(format!(
            "{command} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn args_carry_one_size_flag() {
        let out = PathBuf::from("out.png");
        let opts = ExportOptions {
            width: Some(800),
            height: Some(600),
            dpi: None,
        };
        assert_eq!(
            strings(build_args(ExportFormat::Png, &out, &opts)),
            vec!["--export-type=png", "-o", "out.png", "--export-width=800"]
        );
        let opts = ExportOptions {
            dpi: Some(150.0),
            ..Default::default()
        };
        assert_eq!(
            strings(build_args(ExportFormat::Pdf, Path::new("a.pdf"), &opts)),
            vec!["--export-type=pdf", "-o", "a.pdf", "--export-dpi=150"]
        );
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_extension(Path::new("x.PNG")), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::from_extension(Path::new("x.pdf")), Some(ExportFormat::Pdf));
        assert_eq!(ExportFormat::from_extension(Path::new("x.svg")), None);
    }

    #[test]
    fn missing_converter_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = export(
            &Document::new(),
            "vd-no-such-converter",
            ExportFormat::Png,
            &dir.path().join("out.png"),
            &ExportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EditError::ExportFailed(_)));
    }
}
