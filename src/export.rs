//! Self-contained HTML slideshow of recorded steps.

use crate::core::{InteractionEvent, Step};

/// Render `steps` as one HTML document, one slide per step.
///
/// The document has no external dependencies: screenshots are embedded data
/// URLs and navigation (buttons, ArrowLeft/ArrowRight) is inline script.
#[must_use]
pub fn render_slideshow(steps: &[Step], title: &str) -> String {
    let mut slides = String::new();
    for (index, step) in steps.iter().enumerate() {
        let number = index + 1;
        let screenshot = step.screenshot.as_deref().map_or_else(String::new, |src| {
            format!(
                r#"<img src="{}" alt="Step {number} screenshot">"#,
                html_escape(src)
            )
        });

        let events = if step.events.is_empty() {
            "No events recorded".to_string()
        } else {
            step.events
                .iter()
                .map(|e| format!(r#"<div class="event">{}</div>"#, html_escape(&describe_event(e))))
                .collect::<Vec<_>>()
                .join("\n            ")
        };

        let url = if step.page_url.is_empty() {
            "N/A"
        } else {
            step.page_url.as_str()
        };

        slides.push_str(&format!(
            r#"
    <div class="slide" id="slide-{index}">
        <h2>Step {number}</h2>
        <p><strong>URL:</strong> {}</p>
        {screenshot}
        <div class="events">
            <h3>Events:</h3>
            {events}
        </div>
    </div>
"#,
            html_escape(url)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; line-height: 1.6; }}
        .slide {{ display: none; max-width: 800px; margin: 0 auto; padding: 20px; }}
        .slide.active {{ display: block; }}
        .navigation {{ text-align: center; position: fixed; bottom: 0; left: 0; right: 0; background: white; padding: 10px; }}
        .slide img {{ max-width: 100%; border: 1px solid #ccc; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        .events {{ margin-top: 20px; }}
        .event {{ padding: 8px; background: #f5f5f5; margin: 5px 0; border-radius: 4px; }}
        button {{ padding: 10px 20px; margin: 0 5px; cursor: pointer; border: none; background: #007bff; color: white; border-radius: 4px; }}
        button:hover {{ background: #0056b3; }}
        .counter {{ display: inline-block; min-width: 80px; }}
    </style>
</head>
<body>
{slides}
    <div class="navigation">
        <button onclick="prevSlide()">Previous</button>
        <span class="counter" id="slideCounter"></span>
        <button onclick="nextSlide()">Next</button>
    </div>

    <script>
        let currentSlide = 0;
        const slides = document.querySelectorAll('.slide');

        function showSlide(n) {{
            if (slides.length === 0) return;
            slides.forEach(slide => slide.classList.remove('active'));
            currentSlide = (n + slides.length) % slides.length;
            slides[currentSlide].classList.add('active');
            document.getElementById('slideCounter').textContent =
                (currentSlide + 1) + ' / ' + slides.length;
        }}

        function nextSlide() {{ showSlide(currentSlide + 1); }}
        function prevSlide() {{ showSlide(currentSlide - 1); }}

        document.addEventListener('keydown', (e) => {{
            if (e.key === 'ArrowRight') nextSlide();
            if (e.key === 'ArrowLeft') prevSlide();
        }});

        showSlide(0);
    </script>
</body>
</html>
"#,
        html_escape(title)
    )
}

/// One-line description: `click on button #save .primary : "Save"`.
#[must_use]
pub fn describe_event(event: &InteractionEvent) -> String {
    let target = &event.target;
    let tag = if target.tag_name.is_empty() {
        "unknown".to_string()
    } else {
        target.tag_name.to_lowercase()
    };

    let mut line = format!("{} on {tag}", event.kind.as_str());
    if !target.id.is_empty() {
        line.push_str(&format!(" #{}", target.id));
    }
    if !target.class_name.is_empty() {
        line.push_str(&format!(" .{}", target.class_name));
    }
    if !target.text_content.is_empty() {
        line.push_str(&format!(" : \"{}\"", target.text_content));
    }
    line
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
