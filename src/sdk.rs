//! Built-in embed assets. The script is intentionally thin: it owns the
//! session identifier, the panel shell, and click plumbing; every view is
//! rendered server-side and swapped in wholesale.

pub fn embed_script() -> String {
    r##"// leadpanel embed
(() => {
  const SCRIPT = document.currentScript;
  if (!SCRIPT) return;

  const clientId = SCRIPT.getAttribute("data-client") || "";
  const runtime = (SCRIPT.getAttribute("data-api") || new URL(SCRIPT.src).origin).replace(/\/$/, "");
  const inlineSelector = SCRIPT.getAttribute("data-inline") || "";

  if (!clientId) {
    console.warn("[leadpanel] missing data-client");
    return;
  }

  const sessionId = (() => {
    const key = "lp_sid";
    let sid = localStorage.getItem(key);
    if (!sid) {
      sid = "s_" + Math.random().toString(36).slice(2) + Date.now().toString(36);
      localStorage.setItem(key, sid);
    }
    return sid;
  })();

  injectCss();
  boot().catch((err) => console.error("[leadpanel] boot error", err));

  let theme = null;
  let els = null;
  let toggle = null;

  async function boot() {
    const placement = inlineSelector ? "inline" : "floating";
    const params = new URLSearchParams({ client: clientId, session: sessionId, placement });
    const res = await fetch(`${runtime}/api/widget/boot?${params}`);
    if (!res.ok) {
      // Config unavailable: render nothing at all.
      console.warn("[leadpanel] boot declined", res.status);
      return;
    }
    const data = await res.json();
    theme = data.theme;

    const panel = buildPanel();
    if (inlineSelector) {
      const mount = document.querySelector(inlineSelector);
      if (!mount) return;
      panel.classList.add("lp-inline-panel");
      mount.appendChild(panel);
    } else {
      buildFloating(panel);
    }
    apply(data.render);
  }

  function buildPanel() {
    const panel = document.createElement("div");
    panel.id = "lp-panel";
    panel.innerHTML = `
      <div class="lp-header">
        <button class="lp-back" data-action="back" style="display:none;">‹</button>
        <div>
          <p class="lp-title"></p>
          <p class="lp-step"></p>
        </div>
        <button class="lp-close" aria-label="Close">×</button>
      </div>
      <div class="lp-body"></div>
      <div class="lp-footer" style="display:none;"></div>`;
    els = {
      panel,
      title: panel.querySelector(".lp-title"),
      step: panel.querySelector(".lp-step"),
      back: panel.querySelector(".lp-back"),
      close: panel.querySelector(".lp-close"),
      body: panel.querySelector(".lp-body"),
      footer: panel.querySelector(".lp-footer"),
    };
    panel.addEventListener("click", onAction);
    els.close.addEventListener("click", () => close());
    return panel;
  }

  function buildFloating(panel) {
    const launcher = document.createElement("div");
    launcher.id = "lp-launcher";
    launcher.innerHTML = `<button class="lp-btn" style="background:${theme.color}; color:#fff;"><span></span></button>`;
    launcher.querySelector("span").textContent = theme.cta_label;
    document.body.appendChild(launcher);

    const overlay = document.createElement("div");
    overlay.id = "lp-overlay";
    document.body.appendChild(overlay);
    document.body.appendChild(panel);

    toggle = (isOpen) => {
      const method = isOpen ? "add" : "remove";
      overlay.classList[method]("open");
      panel.classList[method]("open");
      if (isOpen) postEvent("widget_open", {});
    };
    launcher.querySelector("button").addEventListener("click", () => toggle(true));
    overlay.addEventListener("click", () => close());
  }

  function close() {
    // Hides the panel only; server-side state survives for resume.
    if (toggle) toggle(false);
    post({ action: "close" }).catch(() => {});
  }

  function apply(render) {
    if (!render || !els) return;
    els.title.textContent = render.title;
    els.step.textContent = render.step;
    els.body.innerHTML = render.body_html;
    els.body.classList.toggle("lp-no-pad", !!render.no_padding);
    els.footer.style.display = render.footer_html ? "block" : "none";
    els.footer.innerHTML = render.footer_html || "";
    els.back.style.display = render.back_visible ? "inline-flex" : "none";
    if (render.error) {
      const status = els.panel.querySelector("#lp-status");
      if (status) status.textContent = render.error;
      const submit = els.panel.querySelector('[data-action="submit"]');
      if (submit) { submit.disabled = false; submit.textContent = "Try Again"; }
    }
  }

  async function onAction(e) {
    const btn = e.target.closest("[data-action]");
    if (!btn) return;
    const action = btn.dataset.action;
    const payload = btn.dataset.payload;

    if (action === "close") { close(); return; }

    try {
      if (action === "submit") {
        btn.disabled = true;
        btn.textContent = "Sending...";
        const val = (id) => (els.panel.querySelector(id) || {}).value || "";
        const data = await post({
          action,
          contact: {
            name: val("#lp-name"),
            email: val("#lp-email"),
            phone: val("#lp-phone"),
            preferred_time: val("#lp-time"),
            message: val("#lp-msg"),
            company_website: val("#lp-hp"),
            referrer: document.referrer || "",
          },
        });
        apply(data.render);
      } else {
        const data = await post({ action, payload });
        apply(data.render);
      }
    } catch (err) {
      console.error("[leadpanel] action error", err);
      if (action === "submit") {
        btn.disabled = false;
        btn.textContent = "Try Again";
      }
    }
  }

  async function post(body) {
    const res = await fetch(`${runtime}/api/widget/action`, {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify(Object.assign({
        session_id: sessionId,
        client: clientId,
        source_url: location.href,
      }, body)),
    });
    if (!res.ok) throw new Error(`action failed: ${res.status}`);
    return res.json();
  }

  function postEvent(name, meta) {
    fetch(`${runtime}/api/widget/events`, {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({
        client: clientId,
        session_id: sessionId,
        event_name: name,
        meta,
        source_url: location.href,
      }),
    }).catch(() => {});
  }

  function injectCss() {
    const href = SCRIPT.getAttribute("data-css") || `${runtime}/widget.css`;
    const link = document.createElement("link");
    link.rel = "stylesheet";
    link.href = href;
    document.head.appendChild(link);
  }
})();
"##
    .to_string()
}

pub fn widget_css() -> String {
    r#"#lp-launcher{position:fixed;right:20px;bottom:20px;z-index:2147483000}
.lp-btn{display:inline-flex;align-items:center;gap:8px;border:0;border-radius:999px;padding:12px 18px;font-size:15px;font-weight:600;cursor:pointer;box-shadow:0 6px 20px rgba(0,0,0,.18)}
#lp-overlay{position:fixed;inset:0;background:rgba(0,0,0,.35);opacity:0;pointer-events:none;transition:opacity .2s;z-index:2147483000}
#lp-overlay.open{opacity:1;pointer-events:auto}
#lp-panel{position:fixed;right:20px;bottom:84px;width:360px;max-width:calc(100vw - 32px);max-height:min(640px,calc(100vh - 104px));display:none;flex-direction:column;background:#fff;border-radius:16px;box-shadow:0 12px 40px rgba(0,0,0,.22);overflow:hidden;z-index:2147483001;font-family:system-ui,-apple-system,sans-serif}
#lp-panel.open{display:flex}
#lp-panel.lp-inline-panel{position:static;display:flex;width:100%;box-shadow:none;border:1px solid rgba(0,0,0,.1)}
.lp-header{display:flex;align-items:center;gap:10px;padding:14px 16px;border-bottom:1px solid rgba(0,0,0,.08)}
.lp-header>div{flex:1}
.lp-title{margin:0;font-size:15px;font-weight:700}
.lp-step{margin:0;font-size:12px;color:rgba(0,0,0,.5)}
.lp-back,.lp-close{border:0;background:none;font-size:20px;cursor:pointer;padding:2px 8px}
.lp-body{padding:16px;overflow-y:auto;flex:1}
.lp-body.lp-no-pad{padding:0}
.lp-footer{padding:12px 16px;border-top:1px solid rgba(0,0,0,.08)}
.lp-muted{color:rgba(0,0,0,.55);font-size:14px}
.lp-list{display:flex;flex-direction:column;gap:8px}
.lp-rowitem{display:flex;align-items:center;width:100%;text-align:left;background:#fff;border:1px solid rgba(0,0,0,.12);border-radius:12px;padding:12px;font-size:15px;cursor:pointer}
.lp-rowitem:hover{border-color:rgba(0,0,0,.3)}
.lp-card{background:#fafafa;border-radius:12px}
.lp-label{font-size:12px;font-weight:600;color:rgba(0,0,0,.6);margin:10px 0 4px}
.lp-input{width:100%;box-sizing:border-box;border:1px solid rgba(0,0,0,.15);border-radius:10px;padding:10px;font-size:14px}
.lp-row{display:grid;grid-template-columns:1fr 1fr;gap:10px}
.lp-actions{display:flex;flex-direction:column;gap:8px;margin-top:12px}
.lp-primary{display:block;width:100%;border:0;border-radius:10px;padding:12px;font-size:15px;font-weight:600;cursor:pointer}
.lp-primary:disabled{opacity:.6;cursor:default}
.lp-secondary{display:block;width:100%;border:1px solid rgba(0,0,0,.15);background:#fff;border-radius:10px;padding:11px;font-size:14px;cursor:pointer}
.lp-pill{display:inline-block;border-radius:999px;padding:2px 8px;font-size:11px;font-weight:700}
.lp-pill-muted{background:rgba(0,0,0,.08);color:rgba(0,0,0,.65)}
.lp-iframe{width:100%;height:420px;border:0;background:#f9f9f9}
"#
    .to_string()
}
