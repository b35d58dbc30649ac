//! The demo page.

use crate::engine::Language;
use crate::reference::Example;

pub const TITLE: &str = "Coqui🐸 XTTS";

pub const LICENSE_NOTICE: &str =
    "I agree to the terms of the Coqui Public Model License at https://coqui.ai/cpml";

const DESCRIPTION: &str = r#"<a href="https://huggingface.co/coqui/XTTS-v1">XTTS</a> is a Voice generation model that lets you clone voices into different languages by using just a quick 3-second audio clip.
<br/>
Built on Tortoise, XTTS has important model changes that make cross-language voice cloning and multi-lingual speech generation super easy.
<br/>
This is the same model that powers Coqui Studio, and Coqui API, however we apply a few tricks to make it faster and support streaming inference."#;

const ARTICLE: &str = r#"<p>By using this demo you agree to the terms of the Coqui Public Model License at https://coqui.ai/cpml</p>"#;

/// Values substituted into the page template.
pub struct PageContext<'a> {
    pub model: &'a str,
    pub device: Option<&'a str>,
    pub default_language: Language,
    pub default_prompt: &'a str,
    pub default_speaker: &'a str,
    pub examples: &'a [Example],
}

/// Escape text for use in HTML bodies and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn language_options(selected: Language) -> String {
    Language::ALL
        .iter()
        .map(|lang| {
            format!(
                r#"<option value="{code}" title="{name}"{sel}>{code}</option>"#,
                code = lang.code(),
                name = lang.name(),
                sel = if *lang == selected { " selected" } else { "" },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn example_rows(examples: &[Example]) -> String {
    examples
        .iter()
        .map(|ex| {
            let prompt = escape_html(ex.prompt);
            let speaker = escape_html(ex.speaker);
            format!(
                r#"<tr class="example" data-prompt="{prompt}" data-language="{lang}" data-speaker="{speaker}" data-agree="{agree}"><td>{prompt}</td><td>{lang}</td><td>{speaker}</td></tr>"#,
                lang = ex.language.code(),
                agree = ex.agree,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the full page.
pub fn render_index(ctx: &PageContext<'_>) -> String {
    let model_line = match ctx.device {
        Some(device) => format!("{} on {}", escape_html(ctx.model), escape_html(device)),
        None => escape_html(ctx.model),
    };

    TEMPLATE
        .replace("{{TITLE}}", TITLE)
        .replace("{{DESCRIPTION}}", DESCRIPTION)
        .replace("{{ARTICLE}}", ARTICLE)
        .replace("{{MODEL}}", &model_line)
        .replace("{{LICENSE}}", LICENSE_NOTICE)
        .replace("{{LANGUAGE_OPTIONS}}", &language_options(ctx.default_language))
        .replace("{{DEFAULT_PROMPT}}", &escape_html(ctx.default_prompt))
        .replace("{{DEFAULT_SPEAKER}}", &escape_html(ctx.default_speaker))
        .replace("{{EXAMPLE_ROWS}}", &example_rows(ctx.examples))
}

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{TITLE}}</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1.5rem; color: #1f2937; }
  h1 { text-align: center; }
  .description, .article { line-height: 1.5; }
  .model { color: #6b7280; font-size: 0.85rem; text-align: center; }
  .tabs { display: flex; gap: 0.5rem; border-bottom: 1px solid #e5e7eb; margin: 1rem 0; }
  .tabs button { border: none; background: none; padding: 0.5rem 1rem; cursor: pointer; font-size: 1rem; }
  .tabs button.active { border-bottom: 2px solid #f97316; font-weight: 600; }
  .panel { display: none; }
  .panel.active { display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; }
  label { display: block; font-weight: 600; margin-top: 0.75rem; }
  .info { display: block; font-weight: 400; font-size: 0.8rem; color: #6b7280; }
  textarea, select { width: 100%; box-sizing: border-box; padding: 0.4rem; }
  textarea { min-height: 4rem; }
  button.submit { margin-top: 1rem; background: #f97316; color: white; border: none; padding: 0.6rem 1.2rem; border-radius: 6px; cursor: pointer; }
  button.submit:disabled { opacity: 0.6; cursor: wait; }
  .message { margin-top: 0.75rem; padding: 0.5rem; border-radius: 4px; display: none; }
  .message.warning { display: block; background: #fef3c7; }
  .message.error { display: block; background: #fee2e2; }
  video, audio { width: 100%; margin-top: 0.5rem; }
  table.examples { width: 100%; border-collapse: collapse; margin-top: 1rem; font-size: 0.9rem; }
  table.examples td, table.examples th { border: 1px solid #e5e7eb; padding: 0.3rem 0.5rem; text-align: left; }
  table.examples tr.example { cursor: pointer; }
  table.examples tr.example:hover { background: #fff7ed; }
</style>
</head>
<body>
<h1>{{TITLE}}</h1>
<div class="description">{{DESCRIPTION}}</div>
<p class="model">Model: {{MODEL}}</p>

<div class="tabs">
  <button type="button" class="active" data-tab="upload">Audio file</button>
  <button type="button" data-tab="microphone">Microphone</button>
</div>

<section class="panel active" id="panel-upload">
  <form class="predict-form" data-source="upload">
    <label>Text Prompt<span class="info">One or two sentences at a time is better</span>
      <textarea name="prompt">{{DEFAULT_PROMPT}}</textarea></label>
    <label>Language<span class="info">Select an output language for the synthesised speech</span>
      <select name="language">{{LANGUAGE_OPTIONS}}</select></label>
    <label>Reference Audio<span class="info">Click on the ✎ button to upload your own target speaker audio</span>
      <input type="file" name="speaker_wav" accept="audio/*"></label>
    <input type="hidden" name="example_speaker" value="{{DEFAULT_SPEAKER}}">
    <audio class="reference-preview" controls src="/assets/{{DEFAULT_SPEAKER}}"></audio>
    <label><input type="checkbox" name="agree"> Agree<span class="info">{{LICENSE}}</span></label>
    <button type="submit" class="submit">Submit</button>
    <div class="message"></div>
  </form>
  <div class="outputs">
    <label>Waveform Visual</label><video class="out-video" controls></video>
    <label>Synthesised Audio</label><audio class="out-audio" controls></audio>
  </div>
  <table class="examples">
    <thead><tr><th>Text Prompt</th><th>Language</th><th>Reference Audio</th></tr></thead>
    <tbody>
{{EXAMPLE_ROWS}}
    </tbody>
  </table>
</section>

<section class="panel" id="panel-microphone">
  <form class="predict-form" data-source="microphone">
    <label>Text Prompt<span class="info">One or two sentences at a time is better</span>
      <textarea name="prompt">{{DEFAULT_PROMPT}}</textarea></label>
    <label>Language<span class="info">Select an output language for the synthesised speech</span>
      <select name="language">{{LANGUAGE_OPTIONS}}</select></label>
    <label>Reference Audio<span class="info">Record your own target speaker audio</span></label>
    <button type="button" class="record">Record from microphone</button>
    <audio class="reference-preview" controls></audio>
    <label><input type="checkbox" name="agree"> Agree<span class="info">{{LICENSE}}</span></label>
    <button type="submit" class="submit">Submit</button>
    <div class="message"></div>
  </form>
  <div class="outputs">
    <label>Waveform Visual</label><video class="out-video" controls></video>
    <label>Synthesised Audio</label><audio class="out-audio" controls></audio>
  </div>
</section>

<div class="article">{{ARTICLE}}</div>

<script>
(function () {
  const recordings = new WeakMap();

  document.querySelectorAll('.tabs button').forEach((tab) => {
    tab.addEventListener('click', () => {
      document.querySelectorAll('.tabs button').forEach((b) => b.classList.toggle('active', b === tab));
      document.querySelectorAll('.panel').forEach((p) => p.classList.toggle('active', p.id === 'panel-' + tab.dataset.tab));
    });
  });

  function showMessage(form, kind, text) {
    const box = form.querySelector('.message');
    box.className = 'message' + (kind ? ' ' + kind : '');
    box.textContent = text || '';
  }

  function encodeWav(buffer) {
    const rate = buffer.sampleRate;
    const frames = buffer.length;
    const mono = new Float32Array(frames);
    for (let c = 0; c < buffer.numberOfChannels; c++) {
      const data = buffer.getChannelData(c);
      for (let i = 0; i < frames; i++) mono[i] += data[i] / buffer.numberOfChannels;
    }
    const view = new DataView(new ArrayBuffer(44 + frames * 2));
    const text = (offset, s) => { for (let i = 0; i < s.length; i++) view.setUint8(offset + i, s.charCodeAt(i)); };
    text(0, 'RIFF'); view.setUint32(4, 36 + frames * 2, true); text(8, 'WAVE');
    text(12, 'fmt '); view.setUint32(16, 16, true); view.setUint16(20, 1, true); view.setUint16(22, 1, true);
    view.setUint32(24, rate, true); view.setUint32(28, rate * 2, true); view.setUint16(32, 2, true); view.setUint16(34, 16, true);
    text(36, 'data'); view.setUint32(40, frames * 2, true);
    for (let i = 0; i < frames; i++) {
      const s = Math.max(-1, Math.min(1, mono[i]));
      view.setInt16(44 + i * 2, s < 0 ? s * 0x8000 : s * 0x7fff, true);
    }
    return new Blob([view], { type: 'audio/wav' });
  }

  document.querySelectorAll('button.record').forEach((button) => {
    const form = button.closest('form');
    let recorder = null;
    let chunks = [];
    button.addEventListener('click', async () => {
      if (recorder && recorder.state === 'recording') {
        recorder.stop();
        return;
      }
      try {
        const stream = await navigator.mediaDevices.getUserMedia({ audio: true });
        recorder = new MediaRecorder(stream);
        chunks = [];
        recorder.ondataavailable = (e) => chunks.push(e.data);
        recorder.onstop = async () => {
          stream.getTracks().forEach((t) => t.stop());
          button.textContent = 'Record from microphone';
          const raw = await new Blob(chunks).arrayBuffer();
          const ctx = new AudioContext();
          const wav = encodeWav(await ctx.decodeAudioData(raw));
          recordings.set(form, wav);
          form.querySelector('.reference-preview').src = URL.createObjectURL(wav);
        };
        recorder.start();
        button.textContent = 'Stop recording';
      } catch (err) {
        showMessage(form, 'error', 'Microphone unavailable: ' + err);
      }
    });
  });

  document.querySelectorAll('input[type=file][name=speaker_wav]').forEach((input) => {
    input.addEventListener('change', () => {
      const form = input.closest('form');
      if (input.files.length) {
        form.querySelector('.reference-preview').src = URL.createObjectURL(input.files[0]);
      }
    });
  });

  document.querySelectorAll('tr.example').forEach((row) => {
    row.addEventListener('click', () => {
      const form = row.closest('.panel').querySelector('form');
      form.elements.prompt.value = row.dataset.prompt;
      form.elements.language.value = row.dataset.language;
      form.elements.example_speaker.value = row.dataset.speaker;
      form.elements.speaker_wav.value = '';
      form.elements.agree.checked = row.dataset.agree === 'true';
      form.querySelector('.reference-preview').src = '/assets/' + encodeURIComponent(row.dataset.speaker);
    });
  });

  document.querySelectorAll('form.predict-form').forEach((form) => {
    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      const panel = form.closest('.panel');
      const data = new FormData(form);
      const recording = recordings.get(form);
      if (recording) data.set('speaker_wav', recording, 'recording.wav');
      if (!form.elements.agree.checked) data.delete('agree');

      const submit = form.querySelector('button.submit');
      submit.disabled = true;
      showMessage(form, null, '');
      try {
        const response = await fetch('/api/predict', { method: 'POST', body: data });
        const body = await response.json();
        if (!response.ok) {
          showMessage(form, 'error', body.error || response.statusText);
          return;
        }
        if (body.warning) showMessage(form, 'warning', body.warning);
        const video = panel.querySelector('.out-video');
        const audio = panel.querySelector('.out-audio');
        if (body.video) { video.src = body.video; } else { video.removeAttribute('src'); video.load(); }
        if (body.audio) { audio.src = body.audio; } else { audio.removeAttribute('src'); audio.load(); }
      } catch (err) {
        showMessage(form, 'error', String(err));
      } finally {
        submit.disabled = false;
      }
    });
  });
})();
</script>
</body>
</html>
"##;
