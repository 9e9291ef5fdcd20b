//! The grammar helper endpoints.
//!
//! Everything here except `health` sits behind the session gate in `security`.

use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use tracing::{error, info, warn};

use crate::{
    AppState, OK_JSON,
    correction::PARSING_TROUBLE,
    model::{
        grammar_page::GrammarPage,
        submission::{Submission, UploadedFile},
    },
    security::SessionUser,
    validation::{self, FILE_FIELD, MAX_UPLOAD_BYTES, TEXT_FIELD, ValidationError},
};

const CHECK_COMPLETED: &str = "Grammar check completed successfully!";

/// Liveness probe, reachable without a session
pub async fn health() -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/json")], OK_JSON)
}

/// Returns the blank grammar page, describing the form to fill in
pub async fn grammar_form() -> Json<GrammarPage> {
    Json(GrammarPage::default())
}

/// Validates the submitted form and runs the grammar check.
///
/// The page is always rendered: validation failures come back as `400` with the form
/// errors filled in, failures of the generation API as `502` with a single error notice.
pub async fn grammar_helper(
    State(state): State<AppState>,
    Extension(SessionUser(user)): Extension<SessionUser>,
    multipart: Multipart,
) -> (StatusCode, Json<GrammarPage>) {
    let mut page = GrammarPage::default();
    let mut submission = Submission::default();

    if let Err(e) = read_submission(multipart, &mut submission).await {
        page.form.text_input = submission.text_input.unwrap_or_default();

        // Only an upload can outgrow the body limit; report it like any oversized file
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            info!("Rejected oversized grammar form from {user}");
            page.form_errors(ValidationError::FileTooLarge.into());
        } else {
            warn!("Could not read grammar form from {user}: {e}");
            page.error(format!("Could not read the submitted form: {}", e.body_text()));
        }
        return (StatusCode::BAD_REQUEST, Json(page));
    }

    page.form.text_input = submission.text_input.clone().unwrap_or_default();
    page.form.file_name = submission.file_upload.as_ref().map(|f| f.name.clone());

    let text = match validation::validate(submission) {
        Ok(text) => text,
        Err(errors) => {
            info!("Rejected grammar form from {user}");
            page.form_errors(errors);
            return (StatusCode::BAD_REQUEST, Json(page));
        }
    };

    info!(
        "{user} submitted {} chars for a grammar check",
        text.as_str().len()
    );
    page.original_text = Some(text.as_str().to_owned());

    match state.checker.check(&text).await {
        Ok(outcome) => {
            if outcome.parsing_trouble {
                page.warning(PARSING_TROUBLE);
            }
            page.success(CHECK_COMPLETED);
            info!(
                "Grammar check for {user} completed by {} with score {}",
                outcome.model, outcome.result.overall_score
            );
            page.results = Some(outcome.result);
            (StatusCode::OK, Json(page))
        }
        Err(e) if e.is_user_error() => {
            page.error(e.to_string());
            (StatusCode::BAD_REQUEST, Json(page))
        }
        Err(e) => {
            error!("Grammar check for {user} failed: {e}");
            page.error(format!("An error occurred: {e}"));
            (StatusCode::BAD_GATEWAY, Json(page))
        }
    }
}

/// Collects the two form inputs; unknown fields are ignored.
///
/// Uploads are buffered up to `MAX_UPLOAD_BYTES`; past that only their size is counted.
async fn read_submission(
    mut multipart: Multipart,
    submission: &mut Submission,
) -> Result<(), MultipartError> {
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();

        if name == TEXT_FIELD {
            submission.text_input = Some(field.text().await?);
        } else if name == FILE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let mut data = Vec::new();
            let mut size = 0;

            while let Some(chunk) = field.chunk().await? {
                size += chunk.len();
                if data.len() <= MAX_UPLOAD_BYTES {
                    data.extend_from_slice(&chunk);
                }
            }

            // Browsers send an unnamed, empty part when no file was chosen
            if !file_name.is_empty() {
                submission.file_upload = Some(UploadedFile::truncated(file_name, data, size));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, Response, header::AUTHORIZATION},
    };
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::*;
    use crate::config::{AuthConfig, SessionEntry};
    use crate::gemini::testing::{Reply, ScriptedClient};
    use crate::model::session::IssuedSession;
    use crate::security::issue_session;

    const BOUNDARY: &str = "grammar-test-boundary";
    const FLASH: &str = "models/gemini-2.5-flash";
    const CLEAN: &str = r#"Here is the result: {"corrected_text":"Hi.","errors":[],"overall_score":100,"suggestions":[],"summary":"clean"}"#;

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, Vec<u8>),
    }

    fn multipart_body(parts: Vec<Part>) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: text/plain\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn state(client: ScriptedClient) -> (AppState, IssuedSession) {
        let session = issue_session();
        let auth = AuthConfig {
            login_url: "/".into(),
            sessions: vec![SessionEntry {
                user: "alice".into(),
                token_hash: session.token_hash.clone(),
                expires: None,
            }],
        };
        (AppState::scripted(client, auth), session)
    }

    async fn post(state: AppState, session: &IssuedSession, parts: Vec<Part<'_>>) -> Response<Body> {
        crate::app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/grammar")
                    .header(AUTHORIZATION, &session.session_token)
                    .header(
                        CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(parts)))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn levels(page: &Value) -> Vec<String> {
        page["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["level"].as_str().unwrap().to_owned())
            .collect()
    }

    #[tokio::test]
    async fn typed_text_is_checked() {
        let (state, session) = state(ScriptedClient::new().text(FLASH, CLEAN));

        let response = post(state, &session, vec![Part::Text("text_input", "  Hi.  ")]).await;
        assert_eq!(response.status(), StatusCode::OK);

        let page = json(response).await;
        assert_eq!(page["original_text"], "Hi.");
        assert_eq!(page["results"]["overall_score"], 100);
        assert_eq!(page["messages"][0]["message"], CHECK_COMPLETED);
        assert_eq!(levels(&page), vec!["success"]);
    }

    #[tokio::test]
    async fn uploaded_file_is_checked() {
        let (state, session) = state(ScriptedClient::new().text(FLASH, CLEAN));

        let response = post(
            state,
            &session,
            vec![
                Part::Text("text_input", ""),
                Part::File("file_upload", "essay.txt", b"Their is a cat.".to_vec()),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let page = json(response).await;
        assert_eq!(page["original_text"], "Their is a cat.");
        assert_eq!(page["form"]["file_name"], "essay.txt");
    }

    #[tokio::test]
    async fn wrong_file_type_never_reaches_the_api() {
        // Any call to the API would fail with a 502
        let (state, session) = state(ScriptedClient::new());

        let response = post(
            state,
            &session,
            vec![Part::File("file_upload", "notes.pdf", b"%PDF-1.7".to_vec())],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = json(response).await;
        assert_eq!(
            page["form"]["errors"]["file_upload"][0],
            "Please upload a .txt file only."
        );
        assert_eq!(
            page["messages"][0]["message"],
            "file_upload: Please upload a .txt file only."
        );
        assert!(page["results"].is_null());
    }

    #[tokio::test]
    async fn oversized_upload_gets_a_field_error() {
        let (state, session) = state(ScriptedClient::new().text(FLASH, CLEAN));

        let response = post(
            state,
            &session,
            vec![Part::File("file_upload", "big.txt", vec![b'a'; MAX_UPLOAD_BYTES + 1])],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = json(response).await;
        assert_eq!(
            page["form"]["errors"]["file_upload"][0],
            "File size should not exceed 1MB."
        );
    }

    #[tokio::test]
    async fn upload_beyond_two_mib_gets_a_field_error() {
        let (state, session) = state(ScriptedClient::new());

        let response = post(
            state,
            &session,
            vec![
                Part::Text("text_input", "kept"),
                Part::File("file_upload", "big.txt", vec![b'a'; 3 * 1024 * 1024]),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = json(response).await;
        assert_eq!(
            page["form"]["errors"]["file_upload"][0],
            "File size should not exceed 1MB."
        );
        assert_eq!(page["form"]["text_input"], "kept");
        assert_eq!(levels(&page), vec!["error"]);
    }

    #[tokio::test]
    async fn body_over_the_transport_limit_is_a_file_error() {
        let (state, session) = state(ScriptedClient::new());

        let response = post(
            state,
            &session,
            vec![Part::File(
                "file_upload",
                "huge.txt",
                vec![b'a'; crate::MAX_BODY_BYTES + 1],
            )],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = json(response).await;
        assert_eq!(
            page["form"]["errors"]["file_upload"][0],
            "File size should not exceed 1MB."
        );
        assert_eq!(
            page["messages"][0]["message"],
            "file_upload: File size should not exceed 1MB."
        );
    }

    #[tokio::test]
    async fn empty_form_is_missing_input() {
        let (state, session) = state(ScriptedClient::new());

        let response = post(
            state,
            &session,
            vec![
                Part::Text("text_input", "   "),
                Part::File("file_upload", "", Vec::new()),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = json(response).await;
        assert_eq!(
            page["form"]["errors"]["__all__"][0],
            "Please either enter text in the text area or upload a .txt file."
        );
        assert!(page["form"]["errors"].get("file_upload").is_none());
    }

    #[tokio::test]
    async fn prose_reply_warns_and_succeeds() {
        let (state, session) = state(
            ScriptedClient::new().text(FLASH, "Looks good to me, nothing to fix."),
        );

        let response = post(state, &session, vec![Part::Text("text_input", "I am fine.")]).await;
        assert_eq!(response.status(), StatusCode::OK);

        let page = json(response).await;
        assert_eq!(levels(&page), vec!["warning", "success"]);
        assert_eq!(page["messages"][0]["message"], PARSING_TROUBLE);
        assert_eq!(page["results"]["overall_score"], 0);
        assert_eq!(
            page["results"]["corrected_text"],
            "Looks good to me, nothing to fix."
        );
    }

    #[tokio::test]
    async fn all_models_failing_is_one_error_notice() {
        let (state, session) = state(ScriptedClient::new().reply(FLASH, Reply::Status(500)));

        let response = post(state, &session, vec![Part::Text("text_input", "Hi.")]).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let page = json(response).await;
        assert_eq!(levels(&page), vec!["error"]);
        let message = page["messages"][0]["message"].as_str().unwrap();
        assert!(message.starts_with("An error occurred: Failed to use any available model."));
        assert!(page["results"].is_null());
        assert_eq!(page["original_text"], "Hi.");
    }

    #[tokio::test]
    async fn blank_file_content_is_a_user_error() {
        let (state, session) = state(ScriptedClient::new().text(FLASH, CLEAN));

        let response = post(
            state,
            &session,
            vec![Part::File("file_upload", "blank.txt", b" \n\n ".to_vec())],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = json(response).await;
        assert_eq!(
            page["messages"][0]["message"],
            "Please provide some text to check."
        );
    }

    #[tokio::test]
    async fn truncated_form_is_a_bad_request() {
        let (state, session) = state(ScriptedClient::new());
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"text_input\"\r\n\r\nHi."
        );

        let response = crate::app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/grammar")
                    .header(AUTHORIZATION, &session.session_token)
                    .header(
                        CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = json(response).await;
        assert_eq!(levels(&page), vec!["error"]);
        assert!(
            page["messages"][0]["message"]
                .as_str()
                .unwrap()
                .starts_with("Could not read the submitted form")
        );
    }

    #[tokio::test]
    async fn blank_form_describes_fields() {
        let (state, session) = state(ScriptedClient::new());

        let response = crate::app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/grammar")
                    .header(AUTHORIZATION, &session.session_token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = json(response).await;
        assert_eq!(page["form"]["fields"][1]["accept"], ".txt");
        assert_eq!(page["form"]["max_upload_bytes"], MAX_UPLOAD_BYTES);
        assert!(page["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_needs_no_session() {
        let (state, _) = state(ScriptedClient::new());

        let response = crate::app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["message"], "OK");
    }
}
