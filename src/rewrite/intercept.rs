//! Client-side request interception snippet
//!
//! Static rewriting cannot see URLs that page scripts assemble at runtime,
//! so proxied documents carry a small script that wraps `fetch`,
//! `XMLHttpRequest.open`, `navigator.sendBeacon` and `window.open` and
//! routes their targets through the page endpoint.

use super::RewriteContext;

const TEMPLATE: &str = r#"<script data-mirage="intercept">(function () {
  var ENDPOINT = __ENDPOINT__;
  var TARGET = __TARGET__;
  function proxify(input) {
    if (input === undefined || input === null) return input;
    var raw = String(input);
    if (raw.indexOf(ENDPOINT + '?url=') === 0) return raw;
    if (/^(data|blob|about|javascript):/i.test(raw)) return raw;
    var absolute;
    try { absolute = new URL(raw, TARGET).href; } catch (e) { return raw; }
    if (!/^https?:/i.test(absolute)) return raw;
    return ENDPOINT + '?url=' + encodeURIComponent(absolute);
  }
  if (window.fetch) {
    var nativeFetch = window.fetch;
    window.fetch = function (input, init) {
      if (typeof Request !== 'undefined' && input instanceof Request) {
        input = new Request(proxify(input.url), input);
      } else {
        input = proxify(input);
      }
      return nativeFetch.call(this, input, init);
    };
  }
  if (window.XMLHttpRequest) {
    var nativeOpen = XMLHttpRequest.prototype.open;
    XMLHttpRequest.prototype.open = function (method, url) {
      var args = Array.prototype.slice.call(arguments);
      args[1] = proxify(url);
      return nativeOpen.apply(this, args);
    };
  }
  if (navigator.sendBeacon) {
    var nativeBeacon = navigator.sendBeacon.bind(navigator);
    navigator.sendBeacon = function (url, data) {
      return nativeBeacon(proxify(url), data);
    };
  }
  var nativeWindowOpen = window.open;
  window.open = function (url) {
    var args = Array.prototype.slice.call(arguments);
    args[0] = proxify(url);
    return nativeWindowOpen.apply(window, args);
  };
})();</script>"#;

/// Render the interception `<script>` element for one document.
pub(crate) fn script(ctx: &RewriteContext) -> String {
    TEMPLATE
        .replace("__ENDPOINT__", &js_string(&ctx.page_endpoint))
        .replace("__TARGET__", &js_string(ctx.target.as_str()))
}

// JSON string literal, with `<` escaped so `</script>` cannot close the element.
fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('<', "\\u003c")
}
