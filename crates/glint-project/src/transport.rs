//! JSON-lines bridging between crossbeam channels and byte streams.
//!
//! Children always talk through a `Sender`/`Receiver` pair. For process
//! children the orchestrator and the child each run a feeder thread (channel
//! → stream) and a reader thread (stream → channel) over the child's
//! stdin/stdout, one JSON document per line.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Forward every message from `rx` to `writer` until the channel closes
/// or the stream breaks.
pub fn spawn_feeder<T, W>(name: &str, rx: Receiver<T>, writer: W) -> io::Result<JoinHandle<()>>
where
    T: Serialize + Send + 'static,
    W: Write + Send + 'static,
{
    let label = name.to_string();
    thread::Builder::new().name(format!("{name}-feed")).spawn(move || {
        let mut writer = BufWriter::new(writer);
        for message in rx.iter() {
            if let Err(e) = write_line(&mut writer, &message) {
                tracing::debug!(child = %label, "feeder stopped: {e}");
                return;
            }
        }
        tracing::trace!(child = %label, "feeder channel closed");
    })
}

/// Parse lines from `reader` into `tx` until end of stream or until the
/// receiving side hangs up. Lines that fail to parse are logged and skipped.
pub fn spawn_reader<T, R>(name: &str, reader: R, tx: Sender<T>) -> io::Result<JoinHandle<()>>
where
    T: DeserializeOwned + Send + 'static,
    R: Read + Send + 'static,
{
    let label = name.to_string();
    thread::Builder::new().name(format!("{name}-read")).spawn(move || {
        for line in BufReader::new(reader).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::debug!(child = %label, "reader stopped: {e}");
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(message) => {
                    if tx.send(message).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!(child = %label, "dropping malformed message: {e}"),
            }
        }
        tracing::trace!(child = %label, "end of stream");
    })
}

/// Child side: run `serve` with a channel pair bridged to stdin/stdout.
///
/// Returns once `serve` has returned and every outgoing message has been
/// flushed to stdout.
pub fn serve_stdio<In, Out, R>(
    name: &str,
    serve: impl FnOnce(Receiver<In>, Sender<Out>) -> R,
) -> io::Result<R>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    let (in_tx, in_rx) = unbounded();
    let (out_tx, out_rx) = unbounded();
    // The stdin reader stays blocked in read until the parent closes the
    // pipe, so it is left detached.
    let _reader = spawn_reader(name, io::stdin(), in_tx)?;
    let feeder = spawn_feeder(name, out_rx, io::stdout())?;

    let result = serve(in_rx, out_tx);
    if feeder.join().is_err() {
        tracing::warn!(child = name, "stdout feeder panicked");
    }
    Ok(result)
}

fn write_line<T: Serialize, W: Write>(writer: &mut W, message: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, message)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
