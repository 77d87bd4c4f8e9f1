//! Dashboard page
//!
//! Single HTML page (vanilla JS, no frameworks): upload, pick a model,
//! transcribe, then preview and download every artifact.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(dashboard_page))
}

/// GET /
async fn dashboard_page() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Music Transcriber</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 960px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
        }
        h1 {
            color: #333;
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        .panel {
            border: 1px solid #ddd;
            border-radius: 4px;
            padding: 16px;
            margin: 16px 0;
        }
        button {
            padding: 10px 20px;
            background: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }
        button:disabled {
            background: #999;
            cursor: default;
        }
        .error {
            color: #b00020;
        }
        #plot {
            max-width: 100%;
        }
        ul.downloads a {
            margin-right: 12px;
        }
    </style>
</head>
<body>
    <h1>Music Transcriber</h1>
    <p>Upload a .wav or .mp3 recording and get back MIDI, an audio preview, a score and a piano roll.</p>

    <div class="panel">
        <input type="file" id="file" accept=".wav,.mp3">
        <select id="model"></select>
        <button id="run" disabled>Transcribe</button>
        <p id="status"></p>
    </div>

    <div class="panel" id="results" hidden>
        <h2 id="title"></h2>
        <audio id="preview" controls hidden></audio>
        <img id="plot" alt="Piano roll" hidden>
        <ul class="downloads" id="downloads"></ul>
    </div>

    <script>
        const fileInput = document.getElementById('file');
        const modelSelect = document.getElementById('model');
        const runButton = document.getElementById('run');
        const statusLine = document.getElementById('status');

        function setStatus(text, isError) {
            statusLine.textContent = text;
            statusLine.className = isError ? 'error' : '';
        }

        async function errorMessage(response) {
            try {
                const body = await response.json();
                return body.error ? body.error.message : response.statusText;
            } catch (_) {
                return response.statusText;
            }
        }

        async function loadModels() {
            const response = await fetch('/available-models');
            const body = await response.json();
            for (const [name, checkpoint] of Object.entries(body.available_models)) {
                const option = document.createElement('option');
                option.value = name;
                option.textContent = `${name} (${checkpoint})`;
                option.selected = name === 'piano';
                modelSelect.appendChild(option);
            }
        }

        function fileName(path) {
            return path ? path.split(/[\\/]/).pop() : null;
        }

        function showResults(body) {
            const links = document.getElementById('downloads');
            links.innerHTML = '';
            const artifacts = [
                ['midi', body.midi_file_path, 'MIDI'],
                ['audio', body.midi_audio_path, 'Audio preview'],
                ['score', body.midi_score_path, 'Score (PDF)'],
                ['plot', body.midi_plot_path, 'Piano roll'],
            ];
            for (const [kind, path, label] of artifacts) {
                const name = fileName(path);
                if (!name) continue;
                const item = document.createElement('li');
                const link = document.createElement('a');
                link.href = `/download/${kind}/${encodeURIComponent(name)}`;
                link.textContent = label;
                item.appendChild(link);
                links.appendChild(item);
            }

            const preview = document.getElementById('preview');
            preview.hidden = !body.midi_audio_path;
            if (body.midi_audio_path) {
                preview.src = `/download/audio/${encodeURIComponent(fileName(body.midi_audio_path))}`;
            }
            const plot = document.getElementById('plot');
            plot.hidden = !body.midi_plot_path;
            if (body.midi_plot_path) {
                plot.src = `/download/plot/${encodeURIComponent(fileName(body.midi_plot_path))}`;
            }

            document.getElementById('title').textContent =
                `${body.midi_file_name}: ${body.note_count} notes, ${body.total_time.toFixed(1)} s`;
            document.getElementById('results').hidden = false;
        }

        fileInput.addEventListener('change', () => {
            runButton.disabled = fileInput.files.length === 0;
        });

        runButton.addEventListener('click', async () => {
            const file = fileInput.files[0];
            if (!file) return;
            runButton.disabled = true;

            try {
                setStatus('Uploading...', false);
                const form = new FormData();
                form.append('file', file);
                const upload = await fetch('/upload-audio', { method: 'POST', body: form });
                if (!upload.ok) throw new Error(await errorMessage(upload));
                const stored = await upload.json();

                setStatus('Transcribing, this can take a while...', false);
                const query = new URLSearchParams({
                    filename: stored.filename,
                    model_type: modelSelect.value,
                    response_format: 'paths',
                });
                const response = await fetch(`/transcribe?${query}`, { method: 'POST' });
                if (!response.ok) throw new Error(await errorMessage(response));

                showResults(await response.json());
                setStatus('Done.', false);
            } catch (err) {
                setStatus(err.message, true);
            } finally {
                runButton.disabled = false;
            }
        });

        loadModels().catch(err => setStatus(`Could not load models: ${err.message}`, true));
    </script>
</body>
</html>
"#;
