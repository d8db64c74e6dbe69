//! The homepage skeleton used by the CLI and the scenario tests.

use super::{Document, Element, BODY, ROOT};

/// Build the standard homepage document: every element the runtime modules
/// look up by id or class is present. The document is still `Loading`.
pub fn homepage_template() -> Document {
    let doc = Document::new();
    doc.set_attr(BODY, "data-scroll-height", "2400");

    doc.append(
        ROOT,
        Element::new("meta")
            .attr("name", "description")
            .attr("content", ""),
    );

    doc.append(BODY, Element::new("div").class("loading-screen"));
    doc.append(
        BODY,
        Element::new("a")
            .class("skip-link")
            .attr("href", "#main-content")
            .attr("data-i18n-key", "a11y.skip"),
    );

    // Header with navigation and the two switches
    let header = doc.append(
        BODY,
        Element::new("header")
            .class("header")
            .attr("data-offset-height", "64"),
    );
    let nav = doc.append(header, Element::new("nav").class("nav"));
    for (href, key) in [("#about", "nav.about"), ("#projects", "nav.projects")] {
        doc.append(
            nav,
            Element::new("a")
                .class("nav-link")
                .attr("href", href)
                .attr("data-i18n-key", key),
        );
    }
    doc.append(
        header,
        Element::new("button")
            .class("mobile-menu-toggle")
            .attr("aria-expanded", "false"),
    );
    let theme_label = doc.append(header, Element::new("label").class("switch-container"));
    doc.append(
        theme_label,
        Element::new("input").id("theme-switch").attr("type", "checkbox"),
    );
    let lang_label = doc.append(header, Element::new("label").class("switch-container"));
    doc.append(
        lang_label,
        Element::new("input").id("lang-switch").attr("type", "checkbox"),
    );
    doc.append(
        header,
        Element::new("button")
            .id("data-manager-btn")
            .attr("title", "")
            .attr("data-i18n-key", "data.open"),
    );

    // Hero and main content
    let hero = doc.append(
        BODY,
        Element::new("section")
            .class("hero")
            .attr("data-offset-height", "600"),
    );
    doc.append(
        hero,
        Element::new("h1").attr("data-i18n-key", "hero.title"),
    );
    doc.append(
        hero,
        Element::new("p").attr("data-i18n-key", "hero.motto"),
    );

    let main = doc.append(
        BODY,
        Element::new("main")
            .id("main-content")
            .attr("tabindex", "-1"),
    );
    let about = doc.append(
        main,
        Element::new("section")
            .id("about")
            .attr("data-offset-top", "800")
            .attr("data-animation", "fadeIn"),
    );
    doc.append(
        about,
        Element::new("h2").attr("data-i18n-key", "nav.about"),
    );

    // Site statistics
    let stats = doc.append(main, Element::new("section").id("stats").class("animate-on-scroll"));
    for (id, key) in [
        ("uptime-display", "stats.uptime"),
        ("visitor-count", "stats.visitors"),
        ("page-views", "stats.pageviews"),
    ] {
        let item = doc.append(stats, Element::new("div").class("stat-item"));
        doc.append(item, Element::new("span").attr("data-i18n-key", key));
        doc.append(item, Element::new("span").id(id).text("-"));
    }

    // Project cards
    let projects = doc.append(
        main,
        Element::new("section")
            .id("projects")
            .attr("data-offset-top", "1600"),
    );
    for (index, href) in ["https://blog.example.com", "https://photos.example.com"]
        .into_iter()
        .enumerate()
    {
        let card = doc.append(projects, Element::new("div").class("card"));
        let front = doc.append(card, Element::new("div").class("card-front"));
        let placeholder = doc.append(front, Element::new("div").class("image-placeholder"));
        doc.append(
            placeholder,
            Element::new("img")
                .class("card-img")
                .attr("src", &format!("images/project-{}.jpg", index + 1))
                .attr("alt", "")
                .attr("data-i18n-key", "cards.image"),
        );
        let back = doc.append(card, Element::new("div").class("card-back"));
        doc.append(
            back,
            Element::new("a")
                .class("card-link")
                .attr("href", href)
                .attr("data-i18n-key", "cards.visit"),
        );
    }
    let lazy_card = doc.append(projects, Element::new("div").class("card"));
    doc.append(
        lazy_card,
        Element::new("img")
            .class("card-img")
            .attr("data-src", "images/project-3.jpg"),
    );
    doc.append(BODY, Element::new("div").class("image-overlay"));

    // Contact form
    let form = doc.append(main, Element::new("form").id("contact"));
    doc.append(
        form,
        Element::new("input")
            .attr("type", "text")
            .attr("data-i18n-key", "contact.placeholder"),
    );
    doc.append(
        form,
        Element::new("input")
            .attr("type", "submit")
            .attr("data-i18n-key", "contact.submit"),
    );
    doc.append(
        form,
        Element::new("button")
            .attr("data-copy", "hello@example.com")
            .text("hello@example.com"),
    );

    let dialog = doc.append(
        BODY,
        Element::new("div").class("modal").attr("role", "dialog"),
    );
    doc.append(dialog, Element::new("button").id("dialog-close"));
    doc.append(dialog, Element::new("a").id("dialog-link").attr("href", "#about"));

    let footer = doc.append(BODY, Element::new("footer"));
    doc.append(
        footer,
        Element::new("a")
            .attr("href", "https://github.com/example")
            .text("GitHub"),
    );
    doc.append(BODY, Element::new("button").class("scroll-to-top"));

    doc
}
