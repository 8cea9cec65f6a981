//! OpenAPI documentation
//!
//! Serves the OpenAPI 3.0 document and a Swagger UI page for the gateway.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Create OpenAPI routes
pub fn create_openapi_routes() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

async fn openapi_json() -> impl IntoResponse {
    Json(get_openapi_spec())
}

async fn swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": {"$ref": "#/components/schemas/Error"}
            }
        }
    })
}

/// Get the OpenAPI specification as JSON
fn get_openapi_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "ReplyBox API",
            "description": "Fetches a mailbox inbox into storage and schedules replies that are sent asynchronously by the reply worker.",
            "version": env!("CARGO_PKG_VERSION"),
            "license": {
                "name": "Apache-2.0",
                "url": "https://www.apache.org/licenses/LICENSE-2.0"
            }
        },
        "tags": [
            {"name": "emails", "description": "Inbox fetch and replies"},
            {"name": "health", "description": "Health check endpoints"},
            {"name": "metrics", "description": "Prometheus metrics"}
        ],
        "paths": {
            "/emails": {
                "get": {
                    "tags": ["emails"],
                    "summary": "Fetch the inbox into storage",
                    "description": "Lists inbox messages, fetches each one and stores those not seen before with replied = false.",
                    "operationId": "fetchEmails",
                    "responses": {
                        "200": {
                            "description": "Emails fetched",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/FetchResponse"}
                                }
                            }
                        },
                        "500": error_response("Storage failure"),
                        "502": error_response("Provider request or authentication failed")
                    }
                }
            },
            "/emails/{email_id}": {
                "get": {
                    "tags": ["emails"],
                    "summary": "Get a stored email",
                    "operationId": "getEmail",
                    "parameters": [
                        {"name": "email_id", "in": "path", "required": true, "schema": {"type": "integer", "format": "int64"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "Stored email",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Email"}
                                }
                            }
                        },
                        "404": error_response("Email not found")
                    }
                }
            },
            "/reply/{email_id}": {
                "post": {
                    "tags": ["emails"],
                    "summary": "Schedule a reply",
                    "description": "Enqueues a reply job and returns immediately. The email is not looked up here and the send may still fail later.",
                    "operationId": "replyEmail",
                    "parameters": [
                        {"name": "email_id", "in": "path", "required": true, "schema": {"type": "integer", "format": "int64"}},
                        {"name": "reply_content", "in": "query", "required": false, "schema": {"type": "string"}}
                    ],
                    "requestBody": {
                        "required": false,
                        "description": "Used when the reply_content query parameter is absent",
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["reply_content"],
                                    "properties": {
                                        "reply_content": {"type": "string"}
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Reply scheduled",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ReplyResponse"}
                                }
                            }
                        },
                        "422": error_response("Missing or invalid reply content"),
                        "500": error_response("Broker failure")
                    }
                }
            },
            "/health": {
                "get": {
                    "tags": ["health"],
                    "summary": "Basic health check",
                    "operationId": "health",
                    "responses": {
                        "200": {"description": "Service is healthy"}
                    }
                }
            },
            "/health/live": {
                "get": {
                    "tags": ["health"],
                    "summary": "Liveness probe",
                    "operationId": "liveness",
                    "responses": {
                        "200": {"description": "Service is alive"}
                    }
                }
            },
            "/health/ready": {
                "get": {
                    "tags": ["health"],
                    "summary": "Readiness probe",
                    "operationId": "readiness",
                    "responses": {
                        "200": {"description": "Service is ready"},
                        "503": {"description": "Database unreachable"}
                    }
                }
            },
            "/health/detailed": {
                "get": {
                    "tags": ["health"],
                    "summary": "Database status and queue statistics",
                    "operationId": "healthDetailed",
                    "responses": {
                        "200": {"description": "Detailed health status"}
                    }
                }
            },
            "/metrics": {
                "get": {
                    "tags": ["metrics"],
                    "summary": "Prometheus metrics",
                    "operationId": "metrics",
                    "responses": {
                        "200": {
                            "description": "Metrics in the Prometheus text format",
                            "content": {"text/plain": {"schema": {"type": "string"}}}
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "FetchResponse": {
                    "type": "object",
                    "properties": {
                        "status": {"type": "string", "example": "Emails Fetched"},
                        "fetched": {"type": "integer"},
                        "inserted": {"type": "integer"},
                        "skipped": {"type": "integer"}
                    }
                },
                "ReplyResponse": {
                    "type": "object",
                    "properties": {
                        "status": {"type": "string", "example": "Reply Scheduled"},
                        "job_id": {"type": "string", "format": "uuid"}
                    }
                },
                "Email": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "format": "int64"},
                        "sender": {"type": "string"},
                        "subject": {"type": "string"},
                        "body": {"type": "string"},
                        "replied": {"type": "boolean"},
                        "provider_message_id": {"type": "string", "nullable": true},
                        "thread_id": {"type": "string", "nullable": true},
                        "message_id_header": {"type": "string", "nullable": true},
                        "created_at": {"type": "string", "format": "date-time"},
                        "replied_at": {"type": "string", "format": "date-time", "nullable": true}
                    }
                },
                "Error": {
                    "type": "object",
                    "properties": {
                        "error": {"type": "string", "example": "NOT_FOUND"},
                        "message": {"type": "string"}
                    }
                }
            }
        }
    })
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ReplyBox API Documentation</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        body { margin: 0; padding: 0; }
        .swagger-ui .topbar { display: none; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIBundle.SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>"#;
