//! wkhtmltopdf process backend.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Media, PdfRequest, Pixels, RasterizeError, Rasterizer, WaitUntil};

/// Quiet period granted to scripts when the request asks for network idle.
const SETTLE_DELAY_MS: u32 = 500;

/// wkhtmltopdf passes page variables to header/footer pages in the query
/// string. Elements whose class names a variable receive its value.
const PAGE_VARIABLE_SCRIPT: &str = r#"<script>
function subst() {
  var vars = {};
  var query = document.location.search.substring(1).split('&');
  for (var i in query) {
    var pair = query[i].split('=', 2);
    vars[pair[0]] = decodeURIComponent(pair[1]);
  }
  var names = ['page', 'topage', 'frompage', 'section', 'subsection', 'date', 'isodate', 'time', 'title', 'doctitle', 'sitepage', 'sitepages'];
  for (var n in names) {
    var nodes = document.getElementsByClassName(names[n]);
    for (var j = 0; j < nodes.length; ++j) {
      nodes[j].textContent = vars[names[n]];
    }
  }
}
</script>"#;

/// Scratch files for one invocation.
struct Scratch {
    body: PathBuf,
    header: Option<PathBuf>,
    footer: Option<PathBuf>,
    output: PathBuf,
}

/// Runs the `wkhtmltopdf` binary once per request.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfRasterizer {
    binary: PathBuf,
}

impl WkhtmltopdfRasterizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    fn arguments(&self, request: &PdfRequest, scratch: &Scratch) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--quiet".into(),
            "--enable-local-file-access".into(),
            "--encoding".into(),
            "utf-8".into(),
            "--page-size".into(),
            request.format.name.into(),
            "--orientation".into(),
            if request.landscape { "Landscape" } else { "Portrait" }.into(),
        ];

        args.push(match request.media {
            Media::Print => "--print-media-type".into(),
            Media::Screen => "--no-print-media-type".into(),
        });
        args.push(if request.print_background { "--background" } else { "--no-background" }.into());

        for (flag, value) in [
            ("--margin-top", request.margins.top),
            ("--margin-bottom", request.margins.bottom),
            ("--margin-left", request.margins.left),
            ("--margin-right", request.margins.right),
        ] {
            args.push(flag.into());
            args.push(millimetres(value).into());
        }

        if request.wait_until == WaitUntil::NetworkIdle {
            args.push("--javascript-delay".into());
            args.push(SETTLE_DELAY_MS.to_string().into());
        }

        if let Some(header) = &scratch.header {
            args.push("--header-html".into());
            args.push(header.into());
        }
        if let Some(footer) = &scratch.footer {
            args.push("--footer-html".into());
            args.push(footer.into());
        }

        args.push(scratch.body.clone().into());
        args.push(scratch.output.clone().into());
        args
    }

    async fn write_scratch(dir: &Path, request: &PdfRequest) -> Result<Scratch, RasterizeError> {
        let body = dir.join("body.html");
        tokio::fs::write(&body, &request.html).await?;

        let (header, footer) = if request.display_header_footer {
            let header = dir.join("header.html");
            let footer = dir.join("footer.html");
            tokio::fs::write(&header, margin_document(&request.header_template)).await?;
            tokio::fs::write(&footer, margin_document(&request.footer_template)).await?;
            (Some(header), Some(footer))
        } else {
            (None, None)
        };

        Ok(Scratch {
            body,
            header,
            footer,
            output: dir.join("output.pdf"),
        })
    }
}

/// Header/footer fragments are loaded as separate pages.
fn margin_document(fragment: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">{}</head><body style=\"margin:0\" onload=\"subst()\">{}</body></html>",
        PAGE_VARIABLE_SCRIPT, fragment
    )
}

fn millimetres(px: Pixels) -> String {
    format!("{:.2}mm", px.to_mm())
}

#[async_trait]
impl Rasterizer for WkhtmltopdfRasterizer {
    async fn rasterize(&self, request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        let dir = tempfile::tempdir()?;
        let scratch = Self::write_scratch(dir.path(), &request).await?;
        let args = self.arguments(&request, &scratch);

        tracing::debug!(binary = %self.binary.display(), ?args, "running wkhtmltopdf");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    RasterizeError::Launch(format!("{}: {}", self.binary.display(), e))
                }
                _ => RasterizeError::Io(e),
            })?;

        if !output.status.success() {
            return Err(RasterizeError::Process {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(tokio::fs::read(&scratch.output).await?)
    }
}
