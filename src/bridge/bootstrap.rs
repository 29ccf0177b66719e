//! The interception script injected into every composed document.
//!
//! It runs first inside the isolated context, wraps the four console entry
//! points and the global error handler, and posts each call to the host as
//! `{ tag: "console-event", kind, payload }`. Every argument is normalized
//! independently: a JSON round trip when possible, its string form when not.

use crate::bridge::message::CONSOLE_EVENT_TAG;

const BOOTSTRAP_SOURCE: &str = r#"(function () {
  var TAG = "__TAG__";
  function normalize(value) {
    try {
      return JSON.parse(JSON.stringify(value));
    } catch (e) {
      return String(value);
    }
  }
  function send(kind, args) {
    var payload = [];
    for (var i = 0; i < args.length; i++) {
      payload.push(normalize(args[i]));
    }
    try {
      window.parent.postMessage({ tag: TAG, kind: kind, payload: payload }, "*");
    } catch (e) {}
  }
  ["log", "error", "warn", "info"].forEach(function (kind) {
    var native = console[kind];
    console[kind] = function () {
      if (typeof native === "function") {
        native.apply(console, arguments);
      }
      send(kind, arguments);
    };
  });
  window.onerror = function (message, source, line) {
    send("error", [String(message) + " (line " + line + ")"]);
    return false;
  };
})();"#;

/// JavaScript source of the console bootstrap.
pub fn bootstrap_source() -> String {
    BOOTSTRAP_SOURCE.replace("__TAG__", CONSOLE_EVENT_TAG)
}

/// The bootstrap wrapped in a `<script>` element, ready for injection.
pub fn bootstrap_script() -> String {
    format!("<script>\n{}\n</script>\n", bootstrap_source())
}
