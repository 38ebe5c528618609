use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tokio::sync::oneshot;

use super::server::{AppState, AskRequest};

#[derive(serde::Deserialize)]
pub(crate) struct AskForm {
    #[serde(default)]
    pub question: String,
}

fn render_page(question: &str, answer: &str) -> Html<String> {
    let question = html_escape::encode_double_quoted_attribute(question);
    let answer = html_escape::encode_text(answer);
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>crumb</title>
</head>
<body>
<h1>Ask a question</h1>
<form method="post" action="/">
<label for="question">Question</label>
<input type="text" id="question" name="question" value="{question}" autofocus>
<button type="submit">Submit</button>
</form>
<label for="answer">Answer</label>
<textarea id="answer" rows="8" cols="80" readonly>{answer}</textarea>
</body>
</html>
"#
    ))
}

pub(crate) async fn form_handler() -> Html<String> {
    render_page("", "")
}

pub(crate) async fn ask_handler(
    State(state): State<AppState>,
    Form(form): Form<AskForm>,
) -> Response {
    let question = form.question.trim();
    if question.is_empty() {
        return render_page("", "").into_response();
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    let request = AskRequest {
        question: question.to_owned(),
        reply: reply_tx,
    };
    if state.ask_tx.send(request).await.is_err() {
        tracing::warn!("answer worker is gone, rejecting question");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    match reply_rx.await {
        Ok(answer) => render_page(question, &answer).into_response(),
        Err(_) => {
            tracing::error!("answer worker dropped the request");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
