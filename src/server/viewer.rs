//! Viewer module - generates the single-page upload and Deep Zoom viewer.

use axum::{
    extract::{Path, State},
    response::Html,
};

use quick_xml::escape::escape;

use super::handlers::{ApiError, AppState};
use crate::storage::ImageId;
use crate::tile::TilingEngine;

/// Handle viewer requests for the empty page.
///
/// # Endpoint
///
/// `GET /`
pub async fn index_handler() -> Html<String> {
    Html(generate_viewer_html(None))
}

/// Handle viewer requests for a stored image.
///
/// # Endpoint
///
/// `GET /view/{id}`
///
/// # Errors
///
/// - `404 Not Found`: image does not exist
pub async fn viewer_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let id = ImageId::parse(&raw_id).ok_or_else(ApiError::image_not_found)?;
    if !state.storage().exists(&id).await {
        return Err(ApiError::image_not_found());
    }

    Ok(Html(generate_viewer_html(Some(&id.to_string()))))
}

/// Generate the viewer page.
///
/// The page has an upload control, an OpenSeadragon widget, an info panel
/// with stats and a delete button. It shows "No image loaded" until an image
/// is opened, a loading indicator during upload, and an error banner when the
/// upload fails or OpenSeadragon cannot open the manifest.
///
/// # Arguments
///
/// * `image_id` - Image to open on load, if any
pub fn generate_viewer_html(image_id: Option<&str>) -> String {
    let (escaped_id, manifest_url) = match image_id {
        Some(id) => (
            escape(id).into_owned(),
            escape(format!("/api/images/{}/manifest", urlencoding::encode(id)).as_str())
                .into_owned(),
        ),
        None => (String::new(), String::new()),
    };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Deep Zoom Viewer</title>
    <script src="https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon.min.js"></script>
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            background: #0f0f0f;
            color: #e5e5e5;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
            overflow: hidden;
        }}
        #viewer {{
            width: 100vw;
            height: 100vh;
        }}
        .toolbar {{
            position: absolute;
            top: 16px;
            left: 16px;
            z-index: 10;
            display: flex;
            gap: 8px;
            align-items: center;
            background: rgba(20, 20, 20, 0.9);
            border: 1px solid #2a2a2a;
            border-radius: 8px;
            padding: 10px 12px;
        }}
        .toolbar button {{
            background: #2563eb;
            color: white;
            border: none;
            border-radius: 6px;
            padding: 6px 12px;
            cursor: pointer;
        }}
        .toolbar button.danger {{
            background: #b91c1c;
        }}
        .toolbar button:disabled {{
            opacity: 0.5;
            cursor: default;
        }}
        .info-panel {{
            position: absolute;
            top: 16px;
            right: 16px;
            z-index: 10;
            min-width: 220px;
            background: rgba(20, 20, 20, 0.9);
            border: 1px solid #2a2a2a;
            border-radius: 8px;
            padding: 12px 14px;
            font-size: 13px;
            line-height: 1.6;
        }}
        .info-panel .label {{
            color: #8a8a8a;
        }}
        .status {{
            position: absolute;
            top: 50%;
            left: 50%;
            transform: translate(-50%, -50%);
            color: #8a8a8a;
            font-size: 16px;
        }}
        .status.error {{
            color: #f87171;
        }}
        .hidden {{
            display: none;
        }}
    </style>
</head>
<body data-image-id="{escaped_id}" data-manifest-url="{manifest_url}">
    <div class="toolbar">
        <input type="file" id="file-input" accept="image/png,image/jpeg,image/tiff">
        <button id="upload-button">Upload</button>
        <button id="delete-button" class="danger" disabled>Delete</button>
    </div>
    <div id="info-panel" class="info-panel hidden">
        <div><span class="label">Image:</span> <span id="info-id"></span></div>
        <div><span class="label">Size:</span> <span id="info-size"></span></div>
        <div><span class="label">Levels:</span> <span id="info-levels"></span></div>
        <div><span class="label">Tile size:</span> <span id="info-tile"></span></div>
        <div><span class="label">On disk:</span> <span id="info-disk"></span></div>
    </div>
    <div id="status" class="status">No image loaded</div>
    <div id="viewer"></div>
    <script>
        const statusEl = document.getElementById('status');
        const infoPanel = document.getElementById('info-panel');
        const deleteButton = document.getElementById('delete-button');
        let current = null;

        const viewer = OpenSeadragon({{
            id: 'viewer',
            prefixUrl: 'https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon/images/',
            showNavigator: true,
            navigatorPosition: 'BOTTOM_RIGHT',
            maxZoomPixelRatio: 2,
            visibilityRatio: 0.5,
            constrainDuringPan: true
        }});

        viewer.addHandler('open', () => setStatus(null));
        viewer.addHandler('open-failed', (event) => {{
            setStatus('Failed to load image: ' + (event.message || 'unknown error'), true);
        }});

        function setStatus(message, isError) {{
            if (!message) {{
                statusEl.classList.add('hidden');
                return;
            }}
            statusEl.textContent = message;
            statusEl.classList.toggle('error', Boolean(isError));
            statusEl.classList.remove('hidden');
        }}

        function formatBytes(bytes) {{
            const units = ['B', 'KB', 'MB', 'GB'];
            let value = bytes;
            let unit = 0;
            while (value >= 1024 && unit < units.length - 1) {{
                value /= 1024;
                unit += 1;
            }}
            return value.toFixed(unit === 0 ? 0 : 1) + ' ' + units[unit];
        }}

        async function errorMessage(response) {{
            try {{
                const body = await response.json();
                return body.message || response.statusText;
            }} catch (_) {{
                return response.statusText;
            }}
        }}

        async function showImage(image) {{
            current = image;
            document.getElementById('info-id').textContent = image.id;
            document.getElementById('info-size').textContent = image.width + ' x ' + image.height;
            document.getElementById('info-levels').textContent = image.tileInfo.levels;
            document.getElementById('info-tile').textContent = image.tileInfo.tileSize + ' px';
            document.getElementById('info-disk').textContent = '...';
            infoPanel.classList.remove('hidden');
            deleteButton.disabled = false;

            setStatus('Loading tiles...');
            viewer.open(image.dziUrl);

            const stats = await fetch('/api/images/' + encodeURIComponent(image.id) + '/stats');
            if (stats.ok) {{
                const body = await stats.json();
                document.getElementById('info-disk').textContent = formatBytes(body.totalSize);
            }}
        }}

        function reset() {{
            current = null;
            viewer.close();
            infoPanel.classList.add('hidden');
            deleteButton.disabled = true;
            setStatus('No image loaded');
        }}

        document.getElementById('upload-button').addEventListener('click', async () => {{
            const input = document.getElementById('file-input');
            if (!input.files.length) {{
                setStatus('Choose an image first', true);
                return;
            }}

            const form = new FormData();
            form.append('file', input.files[0]);
            setStatus('Uploading and tiling...');

            try {{
                const response = await fetch('/api/images/upload', {{ method: 'POST', body: form }});
                if (!response.ok) {{
                    setStatus('Upload failed: ' + await errorMessage(response), true);
                    return;
                }}
                const image = await response.json();
                history.replaceState(null, '', '/view/' + encodeURIComponent(image.id));
                await showImage(image);
            }} catch (err) {{
                setStatus('Upload failed: ' + err.message, true);
            }}
        }});

        deleteButton.addEventListener('click', async () => {{
            if (!current) {{
                return;
            }}
            const response = await fetch('/api/images/' + encodeURIComponent(current.id), {{ method: 'DELETE' }});
            if (response.ok || response.status === 404) {{
                history.replaceState(null, '', '/');
                reset();
            }} else {{
                setStatus('Delete failed: ' + await errorMessage(response), true);
            }}
        }});

        const manifestUrl = document.body.dataset.manifestUrl;
        if (manifestUrl) {{
            setStatus('Loading image...');
            fetch(manifestUrl)
                .then(async (response) => {{
                    if (!response.ok) {{
                        throw new Error(await errorMessage(response));
                    }}
                    return response.json();
                }})
                .then(showImage)
                .catch((err) => setStatus('Failed to load image: ' + err.message, true));
        }}
    </script>
</body>
</html>"##,
    )
}
