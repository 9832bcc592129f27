//! バイナリに埋め込む静的HTML。ファイルシステム参照なしで配信する。

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="ja">
<head>
<meta charset="utf-8">
<title>見守りモニター - Fall Detection</title>
<style>
  body { font-family: sans-serif; margin: 2em; background: #111; color: #eee; }
  img { max-width: 100%; border: 1px solid #444; }
  button { font-size: 1.1em; padding: 0.4em 1.4em; margin-right: 0.6em; }
  #status { margin-top: 0.8em; color: #aaa; }
  .alert { color: #f55; }
</style>
</head>
<body>
<h1>見守りモニター</h1>
<p>
  <button onclick="control('/start')">Start Detection</button>
  <button onclick="control('/stop')">Stop Detection</button>
</p>
<img id="video" src="/stream.mjpg" alt="camera stream">
<p id="status">idle</p>
<script>
function control(path) {
  fetch(path, { method: 'POST' });
}
async function poll() {
  try {
    const res = await fetch('/status');
    const s = await res.json();
    const el = document.getElementById('status');
    if (s.message) {
      el.textContent = s.message;
      el.className = 'alert';
    } else {
      el.textContent = (s.running ? 'running' : 'stopped')
        + ' / frame ' + s.frame_number + ' / falls ' + s.falls;
      el.className = s.falls > 0 ? 'alert' : '';
    }
  } catch (e) { /* server restarting */ }
}
setInterval(poll, 1000);
</script>
</body>
</html>
"#;
