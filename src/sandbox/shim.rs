// src/sandbox/shim.rs

//! Worker shim for executing learner submissions.
//!
//! The Rust host does NOT execute Python directly.
//! Instead, it spawns a fresh Python interpreter per execution and runs this
//! small bootstrap script in it.
//!
//! Responsibilities of the shim:
//! - Read exactly one JSON request from STDIN
//! - Apply the optional address-space cap
//! - Build the restricted `__builtins__` from the allow-list in the request
//! - Capture ALL submission output into bounded private buffers
//! - Compile and run the submission in a single fresh namespace
//! - Emit ONE report to STDOUT, after the report marker
//!
//! The shim never classifies failures. It reports the exception's class
//! hierarchy and the host decides what the learner sees.

/// File name the shim is written under inside the worker's temp dir.
pub const SHIM_FILE_NAME: &str = "pysandbox_worker.py";

/// Python worker shim.
///
/// Usage (internal):
/// python3 -I -S -B pysandbox_worker.py < request.json
pub fn python_shim() -> &'static str {
    r#"# pysandbox_worker.py
#
# Contract:
# - STDIN carries one JSON request: source, builtins, max_output_chars,
#   memory_limit_mb (optional)
# - Submission output never reaches the real STDOUT/STDERR
# - STDOUT ends with the report marker followed by one JSON object

import builtins
import io
import json
import linecache
import sys
import traceback

MARKER = "__PYSANDBOX_REPORT__"
FILENAME = "<submission>"


class BoundedBuffer(io.TextIOBase):
    def __init__(self, limit):
        super().__init__()
        self._parts = []
        self._size = 0
        self._limit = limit
        self.truncated = False

    def writable(self):
        return True

    def write(self, s):
        if not isinstance(s, str):
            raise TypeError("write() argument must be str, not " + type(s).__name__)
        room = self._limit - self._size
        if room > 0:
            chunk = s[:room]
            self._parts.append(chunk)
            self._size += len(chunk)
        if len(s) > max(room, 0):
            self.truncated = True
        return len(s)

    def getvalue(self):
        return "".join(self._parts)


def clean(text):
    # Lone surrogates cannot cross the UTF-8 pipe.
    return text.encode("utf-8", "replace").decode("utf-8")


def safe_str(exc):
    try:
        return str(exc)
    except BaseException:
        return "<unprintable " + type(exc).__name__ + ">"


def apply_memory_limit(limit_mb):
    if not limit_mb:
        return
    try:
        import resource
    except ImportError:
        return
    limit = int(limit_mb) * 1024 * 1024
    try:
        resource.setrlimit(resource.RLIMIT_AS, (limit, limit))
    except (ValueError, OSError):
        pass


def describe(exc, limit):
    tb = exc.__traceback__
    while tb is not None and tb.tb_frame.f_code.co_filename != FILENAME:
        tb = tb.tb_next

    try:
        trace = "".join(traceback.format_exception(type(exc), exc, tb))
    except BaseException:
        trace = type(exc).__name__ + ": " + safe_str(exc) + "\n"

    info = {
        "type": type(exc).__name__,
        "mro": [cls.__name__ for cls in type(exc).__mro__],
        "message": clean(safe_str(exc))[:limit],
        "traceback": clean(trace)[:limit],
        "lineno": None,
        "text": None,
    }

    if isinstance(exc, SyntaxError):
        info["lineno"] = exc.lineno
        if exc.text:
            info["text"] = clean(exc.text.rstrip())[:limit]

    return info


def main():
    real_stdout = sys.stdout
    real_stderr = sys.stderr

    try:
        request = json.loads(sys.stdin.read())
        source = request["source"]
        allowed = request["builtins"]
        limit = int(request.get("max_output_chars") or 65536)
    except Exception:
        real_stderr.write("pysandbox worker: malformed request\n")
        real_stderr.write(traceback.format_exc())
        sys.exit(2)

    sys.stdin = io.StringIO("")
    apply_memory_limit(request.get("memory_limit_mb"))

    restricted = {}
    for name in allowed:
        if hasattr(builtins, name):
            restricted[name] = getattr(builtins, name)

    namespace = {"__builtins__": restricted, "__name__": "__main__"}
    linecache.cache[FILENAME] = (len(source), None, source.splitlines(True), FILENAME)

    out = BoundedBuffer(limit)
    err = BoundedBuffer(limit)
    error = None

    sys.stdout = out
    sys.stderr = err
    try:
        code = compile(source, FILENAME, "exec")
        exec(code, namespace)
    except BaseException as exc:
        error = describe(exc, limit)
    finally:
        sys.stdout = real_stdout
        sys.stderr = real_stderr

    report = {
        "stdout": clean(out.getvalue()),
        "stderr": clean(err.getvalue()),
        "truncated": out.truncated or err.truncated,
        "error": error,
    }

    real_stdout.write("\n" + MARKER + json.dumps(report, ensure_ascii=False) + "\n")
    real_stdout.flush()


if __name__ == "__main__":
    main()
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::report::REPORT_MARKER;

    #[test]
    fn shim_uses_the_host_marker() {
        assert!(python_shim().contains(&format!("MARKER = \"{}\"", REPORT_MARKER)));
    }

    #[test]
    fn shim_never_passes_real_builtins_module() {
        // The namespace must only ever receive the filtered dict.
        assert!(python_shim().contains("{\"__builtins__\": restricted"));
    }
}
