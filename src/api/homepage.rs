// Landing page served at `/`

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::http::build_html_response;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Guestbook</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }
form { display: grid; gap: .5rem; margin-bottom: 2rem; }
article { border-bottom: 1px solid #ddd; padding: .75rem 0; }
article time { color: #777; font-size: .85rem; }
article img { max-width: 100%; }
</style>
</head>
<body>
<h1>Guestbook</h1>
<form id="entry" enctype="multipart/form-data">
  <input name="nickname" placeholder="Name" maxlength="50" required>
  <textarea name="message" placeholder="Message" rows="4" required></textarea>
  <input type="file" name="file">
  <label><input type="checkbox" name="isPublic" value="true" checked> Public</label>
  <button type="submit">Sign</button>
</form>
<section id="messages"></section>
<script>
const list = document.getElementById('messages');
function render(messages) {
  list.replaceChildren(...messages.map(m => {
    const el = document.createElement('article');
    const head = document.createElement('strong');
    head.textContent = m.name;
    const time = document.createElement('time');
    time.textContent = ' ' + new Date(m.createdAt).toLocaleString();
    const body = document.createElement('p');
    body.textContent = m.content;
    el.append(head, time, body);
    for (const url of m.files) {
      const img = document.createElement('img');
      img.src = url;
      img.alt = '';
      el.append(img);
    }
    return el;
  }));
}
async function refresh() {
  const res = await fetch('/api/messages');
  const json = await res.json();
  if (json.success) render(json.data.filter(m => m.isPublic));
}
document.getElementById('entry').addEventListener('submit', async e => {
  e.preventDefault();
  const res = await fetch('/api/submit', { method: 'POST', body: new FormData(e.target) });
  const json = await res.json();
  if (!json.success) { alert(json.error); return; }
  e.target.reset();
  refresh();
});
refresh();
</script>
</body>
</html>
"#;

pub fn serve_index(is_head: bool) -> Response<Full<Bytes>> {
    build_html_response(INDEX_HTML, is_head)
}
