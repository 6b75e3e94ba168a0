use std::io::{self, Write};
use tracing::level_filters::LevelFilter;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Buffers one formatted event and hands it to the console on drop.
pub(crate) struct ConsoleWriter {
    // Picks the console channel; stderr has only one.
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    level: Level,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: Level) -> Self {
        Self { level, buf: Vec::new() }
    }
}

/// The buffered event without the fmt layer's trailing newline.
pub(crate) fn console_line(buf: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(buf);
    let line = line.trim_end();
    (!line.is_empty()).then(|| line.to_string())
}

impl Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let Some(line) = console_line(&self.buf) else {
            return;
        };

        #[cfg(target_arch = "wasm32")]
        {
            let line = wasm_bindgen::JsValue::from_str(&line);
            if self.level == Level::ERROR {
                web_sys::console::error_1(&line);
            } else if self.level == Level::WARN {
                web_sys::console::warn_1(&line);
            } else if self.level == Level::INFO {
                web_sys::console::info_1(&line);
            } else {
                web_sys::console::debug_1(&line);
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = writeln!(io::stderr(), "{line}");
        }
    }
}

/// Routes each event to the console channel matching its level.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(*meta.level())
    }
}

/// Install the global subscriber. Only the first call takes effect.
pub(crate) fn init(level: LevelFilter) {
    // No clock on wasm32-unknown-unknown; the browser console stamps lines itself.
    let console = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(MakeConsoleWriter);

    if tracing_subscriber::registry()
        .with(level)
        .with(console)
        .try_init()
        .is_err()
    {
        tracing::debug!("subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_line_trims_newline() {
        assert_eq!(
            console_line(b" WARN aitp_console::api: GET /x failed\n").as_deref(),
            Some(" WARN aitp_console::api: GET /x failed")
        );
        assert_eq!(console_line(b"\n"), None);
    }

    #[test]
    fn test_writer_buffers_until_dropped() {
        let mut writer = ConsoleWriter::new(Level::WARN);
        write!(writer, "part one, ").expect("write");
        write!(writer, "part two").expect("write");
        assert_eq!(console_line(&writer.buf).as_deref(), Some("part one, part two"));
    }

    #[test]
    fn test_writer_defaults_to_info() {
        assert_eq!(MakeConsoleWriter.make_writer().level, Level::INFO);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(LevelFilter::INFO);
        init(LevelFilter::DEBUG);
        tracing::info!("still logging");
    }
}
