//! Renders the injected hint-panel fragment (§4.J "Overlay", §6 "Overlay
//! contract").
//!
//! A self-contained `<div>` + inline `<script>`: a fixed-position panel
//! anchored top-right with Previous/Next/Regenerate controls. Regenerate
//! calls back into `http::hint_endpoint` on the proxy's own listening
//! port via `X-Action: regenerate-hint`.

use serde_json::json;

use crate::http::mutator::INJECTION_MARKER;

/// Build the overlay fragment for insertion before `</body>`.
pub fn render(hints: &[String; 4], proxy_port: u16) -> String {
    let marker = std::str::from_utf8(INJECTION_MARKER).unwrap();
    let hints_json = json!(hints).to_string();
    format!(
        r#"<div id="mi-proxy-panel" style="position:fixed;top:12px;right:12px;z-index:2147483647;max-width:320px;padding:12px 14px;background:#1b1b1f;color:#f2f2f2;font:13px/1.4 -apple-system,sans-serif;border-radius:8px;box-shadow:0 2px 12px rgba(0,0,0,.4);">
<div style="display:flex;justify-content:space-between;align-items:center;margin-bottom:6px;">
<strong>Hint</strong>
<button id="mi-proxy-close" style="background:none;border:none;color:#aaa;cursor:pointer;">×</button>
</div>
<div id="mi-proxy-text"></div>
<div style="margin-top:8px;display:flex;gap:6px;">
<button id="mi-proxy-prev">Previous</button>
<button id="mi-proxy-next">Next</button>
<button id="mi-proxy-regen">Regenerate</button>
</div>
</div>
<script>
(function() {{
  var hints = {hints_json};
  var idx = 0;
  var proxyPort = {proxy_port};
  var textEl = document.getElementById('mi-proxy-text');
  var panel = document.getElementById('mi-proxy-panel');
  function render() {{ textEl.textContent = hints[idx] || ''; }}
  document.getElementById('mi-proxy-prev').onclick = function() {{
    idx = (idx - 1 + hints.length) % hints.length; render();
  }};
  document.getElementById('mi-proxy-next').onclick = function() {{
    idx = (idx + 1) % hints.length; render();
  }};
  document.getElementById('mi-proxy-close').onclick = function() {{
    panel.style.display = 'none';
  }};
  document.getElementById('mi-proxy-regen').onclick = function() {{
    fetch('http://127.0.0.1:' + proxyPort, {{
      method: 'POST',
      headers: {{ 'Content-Type': 'application/json', 'X-Action': 'regenerate-hint' }},
    }})
      .then(function(r) {{ return r.json(); }})
      .then(function(data) {{
        if (data && data.hints) {{ hints = data.hints; idx = 0; render(); }}
      }});
  }};
  render();
}})();
</script>
<!-- {marker} -->"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_carries_injection_marker_and_port() {
        let hints = [
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
        ];
        let fragment = render(&hints, 8443);
        assert!(fragment.contains("M+I_Proxy"));
        assert!(fragment.contains("127.0.0.1:8443"));
        assert!(fragment.contains("regenerate-hint"));
    }
}
