//! The embedded client page. Opaque to the server — served verbatim by
//! the HTTP front door (C2) as the body of `GET /` and `GET /index.html`.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no">
    <title>webmux</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/xterm@5.3.0/css/xterm.css">
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        html, body { height: 100%; width: 100%; background: #000; overflow: hidden; }
        #terminal { height: 100%; width: 100%; }
        #status { position: fixed; top: 5px; right: 10px; color: #0f0; font-family: monospace; font-size: 12px; z-index: 1000; }
        .disconnected { color: #f00 !important; }
    </style>
</head>
<body>
    <div id="status">Connecting...</div>
    <div id="terminal"></div>
    <script src="https://cdn.jsdelivr.net/npm/xterm@5.3.0/lib/xterm.min.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/xterm-addon-fit@0.8.0/lib/xterm-addon-fit.min.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/xterm-addon-web-links@0.9.0/lib/xterm-addon-web-links.min.js"></script>
    <script>
        const term = new Terminal({
            cursorBlink: true,
            fontSize: 14,
            fontFamily: 'Menlo, Monaco, "Courier New", monospace',
            theme: { background: '#000000' },
            scrollback: 10000
        });
        const fitAddon = new FitAddon.FitAddon();
        const webLinksAddon = new WebLinksAddon.WebLinksAddon();
        term.loadAddon(fitAddon);
        term.loadAddon(webLinksAddon);
        term.open(document.getElementById('terminal'));
        fitAddon.fit();

        const status = document.getElementById('status');
        let ws;
        let reconnectTimer;

        function connect() {
            const protocol = location.protocol === 'https:' ? 'wss:' : 'ws:';
            ws = new WebSocket(protocol + '//' + location.host + '/ws');
            ws.binaryType = 'arraybuffer';

            ws.onopen = () => {
                status.textContent = 'Connected';
                status.classList.remove('disconnected');
                const size = { type: 'resize', cols: term.cols, rows: term.rows };
                ws.send(JSON.stringify(size));
            };

            ws.onmessage = (event) => {
                if (event.data instanceof ArrayBuffer) {
                    term.write(new Uint8Array(event.data));
                } else {
                    term.write(event.data);
                }
            };

            ws.onclose = () => {
                status.textContent = 'Disconnected - Reconnecting...';
                status.classList.add('disconnected');
                reconnectTimer = setTimeout(connect, 2000);
            };

            ws.onerror = (err) => {
                console.error('WebSocket error:', err);
                ws.close();
            };
        }

        term.onData((data) => {
            if (ws && ws.readyState === WebSocket.OPEN) {
                ws.send(data);
            }
        });

        window.addEventListener('resize', () => {
            fitAddon.fit();
            if (ws && ws.readyState === WebSocket.OPEN) {
                const size = { type: 'resize', cols: term.cols, rows: term.rows };
                ws.send(JSON.stringify(size));
            }
        });

        term.textarea.setAttribute('autocapitalize', 'off');
        term.textarea.setAttribute('autocorrect', 'off');

        connect();
    </script>
</body>
</html>
"#;
