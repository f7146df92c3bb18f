//! Server-side HTML pages.
//!
//! Every page carries its template name in a `data-template` attribute on
//! `<body>`, e.g. `posts/index.html`, so callers and tests can tell which
//! page was rendered.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use yatube_shared::constants::APP_NAME;
use yatube_shared::forms::{
    FieldMeta, COMMENT_TEXT, GROUP_EMPTY_LABEL, IMAGE_CLEAR_FIELD, POST_GROUP, POST_IMAGE,
    POST_TEXT,
};
use yatube_shared::{FormErrors, Page};
use yatube_store::{CommentView, Group, PostView, User};

use crate::auth::Viewer;
use crate::config::ServerConfig;

// ---------------------------------------------------------------------------
// Urls
// ---------------------------------------------------------------------------

/// Profile page of `username`, percent-encoded for links and redirects.
pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

pub fn post_url(id: i64) -> String {
    format!("/posts/{id}/")
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Chrome shared by every page.
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    pub site_name: &'a str,
    pub viewer: Option<&'a str>,
}

impl<'a> Layout<'a> {
    pub fn new(config: &'a ServerConfig, viewer: &'a Viewer) -> Self {
        Self {
            site_name: &config.site_name,
            viewer: viewer.username(),
        }
    }

    fn anonymous() -> Layout<'static> {
        Layout {
            site_name: APP_NAME,
            viewer: None,
        }
    }
}

/// Submitted values and errors of a form being re-rendered.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: BTreeMap<&'static str, String>,
    pub errors: FormErrors,
}

impl FormState {
    pub fn new(errors: FormErrors) -> Self {
        Self {
            values: BTreeMap::new(),
            errors,
        }
    }

    pub fn with(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }
}

pub struct ProfileView<'a> {
    pub author: &'a User,
    pub post_count: usize,
    pub following: bool,
    /// False for anonymous viewers and on one's own profile.
    pub can_follow: bool,
    pub page: &'a Page<PostView>,
}

pub struct PostDetailView<'a> {
    pub post: &'a PostView,
    pub author_post_count: usize,
    pub comments: &'a [CommentView],
    /// `None` hides the comment form (anonymous viewers).
    pub comment_form: Option<&'a FormState>,
    pub can_edit: bool,
}

pub struct PostFormView<'a> {
    pub form: &'a FormState,
    pub groups: &'a [Group],
    /// Id of the post being edited; `None` on the create page.
    pub editing: Option<i64>,
    pub current_image: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Blank lines split paragraphs, single newlines become `<br>`.
fn linebreaks(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%d.%m.%Y %H:%M").to_string()
}

fn document(layout: &Layout<'_>, template: &str, title: &str, content: &str) -> String {
    let site = escape(layout.site_name);
    let nav = match layout.viewer {
        Some(username) => {
            let profile = profile_url(username);
            let username = escape(username);
            format!(
                r#"<a href="/groups/">Группы</a>
      <a href="/follow/">Подписки</a>
      <a href="/create/">Новая запись</a>
      <a href="{profile}">{username}</a>
      <a href="/auth/logout/">Выйти</a>"#
            )
        }
        None => r#"<a href="/groups/">Группы</a>
      <a href="/auth/login/">Войти</a>
      <a href="/auth/signup/">Регистрация</a>"#
            .to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="ru">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} | {site}</title>
</head>
<body data-template="{template}">
  <header>
    <nav>
      <a class="brand" href="/">{site}</a>
      {nav}
    </nav>
  </header>
  <main class="container">
{content}
  </main>
  <footer>
    <p>&copy; {year} Copyright <span>{site}</span></p>
  </footer>
</body>
</html>
"#,
        title = escape(title),
        year = Utc::now().year(),
    )
}

fn post_card(view: &PostView, show_group_link: bool) -> String {
    let post = &view.post;
    let author = escape(&view.author);
    let profile = profile_url(&view.author);
    let mut html = format!(
        r#"<article class="post" id="post-{id}">
  <ul>
    <li>Автор: <a href="{profile}">{author}</a></li>
    <li>Дата публикации: {date}</li>
  </ul>
"#,
        id = post.id,
        date = format_date(&post.pub_date),
    );
    if let Some(image) = &post.image {
        html.push_str(&format!(
            "  <img class=\"card-img\" src=\"/media/{}\" alt=\"\">\n",
            escape(image)
        ));
    }
    html.push_str(&format!(
        "  <div class=\"post-text\">{}</div>\n  <a href=\"{}\">подробная информация</a>\n",
        linebreaks(&post.text),
        post_url(post.id)
    ));
    if show_group_link {
        if let Some(group) = &view.group {
            html.push_str(&format!(
                "  <a href=\"/group/{}/\">все записи группы</a>\n",
                escape(&group.slug)
            ));
        }
    }
    html.push_str("</article>\n");
    html
}

fn post_list(page: &Page<PostView>, show_group_link: bool) -> String {
    if page.is_empty() {
        return "<p class=\"empty\">Записей пока нет.</p>\n".to_string();
    }
    page.items
        .iter()
        .map(|view| post_card(view, show_group_link))
        .collect::<Vec<_>>()
        .join("<hr>\n")
}

fn paginator<T>(page: &Page<T>) -> String {
    if !page.has_other_pages() {
        return String::new();
    }

    let mut html = String::from("<nav class=\"pagination\">\n");
    if let Some(previous) = page.previous_page_number() {
        html.push_str("  <a href=\"?page=1\">Первая</a>\n");
        html.push_str(&format!("  <a href=\"?page={previous}\">Предыдущая</a>\n"));
    }
    for n in page.page_range() {
        if n == page.number {
            html.push_str(&format!("  <span class=\"current\">{n}</span>\n"));
        } else {
            html.push_str(&format!("  <a href=\"?page={n}\">{n}</a>\n"));
        }
    }
    if let Some(next) = page.next_page_number() {
        html.push_str(&format!("  <a href=\"?page={next}\">Следующая</a>\n"));
        html.push_str(&format!(
            "  <a href=\"?page={}\">Последняя</a>\n",
            page.num_pages
        ));
    }
    html.push_str("</nav>\n");
    html
}

fn error_list(messages: &[String]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let items: String = messages
        .iter()
        .map(|m| format!("<li>{}</li>", escape(m)))
        .collect();
    format!("<ul class=\"errorlist\">{items}</ul>\n")
}

fn textarea(meta: &FieldMeta, form: &FormState, required: bool) -> String {
    let placeholder = meta
        .placeholder
        .map(|p| format!(" placeholder=\"{}\"", escape(p)))
        .unwrap_or_default();
    format!(
        r#"<div class="form-group">
  <label for="id_{name}">{label}</label>
  {errors}<textarea name="{name}" id="id_{name}" rows="10"{placeholder}{required}>{value}</textarea>
  <small class="help">{help}</small>
</div>
"#,
        name = meta.name,
        label = escape(meta.label),
        errors = error_list(form.errors.get(meta.name)),
        required = if required { " required" } else { "" },
        value = escape(form.value(meta.name)),
        help = escape(meta.help_text),
    )
}

fn input(name: &'static str, label: &str, kind: &str, form: &FormState) -> String {
    let value = if kind == "password" {
        String::new()
    } else {
        format!(" value=\"{}\"", escape(form.value(name)))
    };
    format!(
        r#"<div class="form-group">
  <label for="id_{name}">{label}</label>
  {errors}<input type="{kind}" name="{name}" id="id_{name}"{value} required>
</div>
"#,
        label = escape(label),
        errors = error_list(form.errors.get(name)),
    )
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

pub fn index(layout: &Layout<'_>, page: &Page<PostView>) -> String {
    let content = format!(
        "<h1>Последние обновления на сайте</h1>\n{}{}",
        post_list(page, true),
        paginator(page)
    );
    document(layout, "posts/index.html", "Последние обновления на сайте", &content)
}

pub fn groups(layout: &Layout<'_>, page: &Page<Group>) -> String {
    let mut content = String::from("<h1>Группы</h1>\n");
    if page.is_empty() {
        content.push_str("<p class=\"empty\">Групп пока нет.</p>\n");
    }
    for group in &page.items {
        content.push_str(&format!(
            "<section class=\"group\">\n  <h2><a href=\"/group/{}/\">{}</a></h2>\n  <p>{}</p>\n</section>\n",
            escape(&group.slug),
            escape(&group.title),
            escape(&group.description)
        ));
    }
    content.push_str(&paginator(page));
    document(layout, "posts/groups.html", "Группы", &content)
}

pub fn group_list(layout: &Layout<'_>, group: &Group, page: &Page<PostView>) -> String {
    let content = format!(
        "<h1>{}</h1>\n<p class=\"description\">{}</p>\n{}{}",
        escape(&group.title),
        linebreaks(&group.description),
        post_list(page, false),
        paginator(page)
    );
    let title = format!("Записи сообщества {}", group.title);
    document(layout, "posts/group_list.html", &title, &content)
}

pub fn profile(layout: &Layout<'_>, view: &ProfileView<'_>) -> String {
    let username = escape(&view.author.username);
    let profile = profile_url(&view.author.username);
    let mut content = format!(
        "<h1>Все посты пользователя {username}</h1>\n<h3>Всего постов: {}</h3>\n",
        view.post_count
    );
    if view.can_follow {
        if view.following {
            content.push_str(&format!(
                "<a class=\"btn btn-light\" href=\"{profile}unfollow/\">Отписаться</a>\n"
            ));
        } else {
            content.push_str(&format!(
                "<a class=\"btn btn-primary\" href=\"{profile}follow/\">Подписаться</a>\n"
            ));
        }
    }
    content.push_str(&post_list(view.page, true));
    content.push_str(&paginator(view.page));

    let title = format!("Профайл пользователя {}", view.author.username);
    document(layout, "posts/profile.html", &title, &content)
}

pub fn follow(layout: &Layout<'_>, page: &Page<PostView>) -> String {
    let content = format!(
        "<h1>Посты избранных авторов</h1>\n{}{}",
        post_list(page, true),
        paginator(page)
    );
    document(layout, "posts/follow.html", "Посты избранных авторов", &content)
}

// ---------------------------------------------------------------------------
// Single post
// ---------------------------------------------------------------------------

pub fn post_detail(layout: &Layout<'_>, view: &PostDetailView<'_>) -> String {
    let post = &view.post.post;
    let author = escape(&view.post.author);
    let profile = profile_url(&view.post.author);

    let group = match &view.post.group {
        Some(group) => format!(
            "<li>Группа: {} <a href=\"/group/{}/\">все записи группы</a></li>",
            escape(&group.title),
            escape(&group.slug)
        ),
        None => String::new(),
    };

    let mut content = format!(
        r#"<aside>
  <ul>
    <li>Дата публикации: {date}</li>
    {group}
    <li>Автор: {author}</li>
    <li>Всего постов автора: <span>{count}</span></li>
    <li><a href="{profile}">все посты пользователя</a></li>
  </ul>
</aside>
<article class="post" id="post-{id}">
"#,
        date = format_date(&post.pub_date),
        count = view.author_post_count,
        id = post.id,
    );
    if let Some(image) = &post.image {
        content.push_str(&format!(
            "  <img class=\"card-img\" src=\"/media/{}\" alt=\"\">\n",
            escape(image)
        ));
    }
    content.push_str(&format!(
        "  <div class=\"post-text\">{}</div>\n",
        linebreaks(&post.text)
    ));
    if view.can_edit {
        content.push_str(&format!(
            "  <a class=\"btn btn-primary\" href=\"/posts/{}/edit/\">редактировать запись</a>\n",
            post.id
        ));
    }
    content.push_str("</article>\n");

    if let Some(form) = view.comment_form {
        content.push_str(&format!(
            "<section class=\"comment-form\">\n<h5>Добавить комментарий:</h5>\n<form method=\"post\" action=\"/posts/{}/comment/\">\n{}<button type=\"submit\">Отправить</button>\n</form>\n</section>\n",
            post.id,
            textarea(&COMMENT_TEXT, form, true)
        ));
    }

    content.push_str("<section class=\"comments\">\n");
    for comment in view.comments {
        content.push_str(&format!(
            "<div class=\"comment\" id=\"comment-{}\">\n  <h5><a href=\"{profile}\">{author}</a></h5>\n  {}\n</div>\n",
            comment.comment.id,
            linebreaks(&comment.comment.text),
            profile = profile_url(&comment.author),
            author = escape(&comment.author),
        ));
    }
    content.push_str("</section>\n");

    let title = format!("Пост {}", post.preview());
    document(layout, "posts/post_detail.html", &title, &content)
}

pub fn create_post(layout: &Layout<'_>, view: &PostFormView<'_>) -> String {
    let (heading, action, button) = match view.editing {
        Some(id) => ("Редактировать пост", format!("/posts/{id}/edit/"), "Сохранить"),
        None => ("Новый пост", "/create/".to_string(), "Добавить"),
    };

    let selected_group = view.form.value(POST_GROUP.name);
    let mut options = format!(
        "<option value=\"\"{}>{}</option>",
        if selected_group.is_empty() { " selected" } else { "" },
        escape(GROUP_EMPTY_LABEL)
    );
    for group in view.groups {
        let id = group.id.to_string();
        options.push_str(&format!(
            "<option value=\"{id}\"{}>{}</option>",
            if selected_group == id { " selected" } else { "" },
            escape(&group.title)
        ));
    }

    let current = match view.current_image {
        Some(image) => format!(
            "На данный момент: <a href=\"/media/{path}\">{path}</a>\n  <label><input type=\"checkbox\" name=\"{IMAGE_CLEAR_FIELD}\" id=\"{IMAGE_CLEAR_FIELD}_id\"> Очистить</label><br>\n  ",
            path = escape(image)
        ),
        None => String::new(),
    };

    let content = format!(
        r#"<h1>{heading}</h1>
<form method="post" enctype="multipart/form-data" action="{action}">
{text}<div class="form-group">
  <label for="id_{group_name}">{group_label}</label>
  {group_errors}<select name="{group_name}" id="id_{group_name}">{options}</select>
  <small class="help">{group_help}</small>
</div>
<div class="form-group">
  <label for="id_{image_name}">{image_label}</label>
  {image_errors}{current}<input type="file" name="{image_name}" id="id_{image_name}" accept="image/*">
  <small class="help">{image_help}</small>
</div>
<button type="submit">{button}</button>
</form>
"#,
        text = textarea(&POST_TEXT, view.form, true),
        group_name = POST_GROUP.name,
        group_label = escape(POST_GROUP.label),
        group_errors = error_list(view.form.errors.get(POST_GROUP.name)),
        group_help = escape(POST_GROUP.help_text),
        image_name = POST_IMAGE.name,
        image_label = escape(POST_IMAGE.label),
        image_errors = error_list(view.form.errors.get(POST_IMAGE.name)),
        image_help = escape(POST_IMAGE.help_text),
    );
    document(layout, "posts/create_post.html", heading, &content)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub fn signup(layout: &Layout<'_>, form: &FormState) -> String {
    let content = format!(
        "<h1>Зарегистрироваться</h1>\n<form method=\"post\" action=\"/auth/signup/\">\n{}{}{}<button type=\"submit\">Зарегистрироваться</button>\n</form>\n",
        input("username", "Имя пользователя", "text", form),
        input("password1", "Пароль", "password", form),
        input("password2", "Подтверждение пароля", "password", form),
    );
    document(layout, "users/signup.html", "Зарегистрироваться", &content)
}

pub fn login(layout: &Layout<'_>, form: &FormState, next: Option<&str>) -> String {
    let next_field = next
        .map(|n| format!("<input type=\"hidden\" name=\"next\" value=\"{}\">\n", escape(n)))
        .unwrap_or_default();
    let content = format!(
        "<h1>Войти</h1>\n<form method=\"post\" action=\"/auth/login/\">\n{}{}{}{}<button type=\"submit\">Войти</button>\n</form>\n",
        error_list(form.errors.get("__all__")),
        input("username", "Имя пользователя", "text", form),
        input("password", "Пароль", "password", form),
        next_field,
    );
    document(layout, "users/login.html", "Войти", &content)
}

pub fn logged_out(layout: &Layout<'_>) -> String {
    document(
        layout,
        "users/logged_out.html",
        "Вы вышли из системы",
        "<h1>Вы вышли из своей учётной записи. Ждём вас снова!</h1>\n",
    )
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub fn not_found_page() -> String {
    document(
        &Layout::anonymous(),
        "core/404.html",
        "Страница не найдена",
        "<h1>Ошибка 404</h1>\n<p>Страница не найдена.</p>\n<a href=\"/\">Идите на главную</a>\n",
    )
}

pub fn server_error_page() -> String {
    document(
        &Layout::anonymous(),
        "core/500.html",
        "Ошибка сервера",
        "<h1>Ошибка 500</h1>\n<p>Что-то пошло не так. Попробуйте позже.</p>\n",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use yatube_shared::{PageRequest, Paginator};
    use yatube_store::Post;

    fn view(id: i64, text: &str, group: Option<Group>) -> PostView {
        PostView {
            post: Post {
                id,
                text: text.to_string(),
                pub_date: Utc::now(),
                author_id: 1,
                group_id: group.as_ref().map(|g| g.id),
                image: None,
            },
            author: "leo".to_string(),
            group,
        }
    }

    fn cats() -> Group {
        Group {
            id: 3,
            title: "Коты".to_string(),
            slug: "cats".to_string(),
            description: "Про котов".to_string(),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#x27;y&#x27;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_profile_links_match_redirect_targets() {
        assert_eq!(profile_url("leo"), "/profile/leo/");
        assert_eq!(profile_url("лев"), "/profile/%D0%BB%D0%B5%D0%B2/");
        assert_eq!(profile_url("a+b@c"), "/profile/a%2Bb%40c/");

        let mut card = view(7, "текст", None);
        card.author = "лев".to_string();
        let html = post_card(&card, false);
        assert!(html.contains(r#"<a href="/profile/%D0%BB%D0%B5%D0%B2/">лев</a>"#));
        assert!(html.contains(r#"<a href="/posts/7/">"#));
    }

    #[test]
    fn test_linebreaks() {
        assert_eq!(linebreaks("a\nb\n\nc"), "<p>a<br>b</p>\n<p>c</p>");
        assert_eq!(linebreaks("<b>"), "<p>&lt;b&gt;</p>");
    }

    #[test]
    fn test_index_lists_posts_with_group_link() {
        let page = Paginator::slice(
            vec![view(1, "hello", Some(cats())), view(2, "plain", None)],
            10,
            PageRequest::first(),
        );
        let html = index(&Layout::anonymous(), &page);

        assert!(html.contains("data-template=\"posts/index.html\""));
        assert!(html.contains("href=\"/posts/1/\""));
        assert!(html.contains("href=\"/group/cats/\""));
        assert!(!html.contains("class=\"pagination\""));
    }

    #[test]
    fn test_paginator_links() {
        let items: Vec<PostView> = (1..=25).map(|i| view(i, "x", None)).collect();
        let page = Paginator::slice(items, 10, PageRequest::number(2));
        let nav = paginator(&page);

        assert!(nav.contains("?page=1\">Первая"));
        assert!(nav.contains("<span class=\"current\">2</span>"));
        assert!(nav.contains("?page=3\">Следующая"));
    }

    #[test]
    fn test_post_form_keeps_values_and_errors() {
        let mut errors = FormErrors::new();
        errors.add("text", "Обязательное поле.");
        let form = FormState::new(errors).with("group", "3");
        let groups = [cats()];
        let html = create_post(
            &Layout::anonymous(),
            &PostFormView {
                form: &form,
                groups: &groups,
                editing: Some(9),
                current_image: Some("posts/a.gif"),
            },
        );

        assert!(html.contains("action=\"/posts/9/edit/\""));
        assert!(html.contains("<option value=\"3\" selected>Коты</option>"));
        assert!(html.contains("Обязательное поле."));
        assert!(html.contains("name=\"image-clear\""));
    }

    #[test]
    fn test_error_pages() {
        assert!(not_found_page().contains("data-template=\"core/404.html\""));
        assert!(server_error_page().contains("data-template=\"core/500.html\""));
    }
}
