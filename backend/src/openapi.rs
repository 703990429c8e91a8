use serde_json::{Value, json};
use shared::Label;

use crate::routes::{IMAGE_FIELD, PREDICT_PATH};

pub const SPEC_PATH: &str = "/apispec_1.json";

/// Swagger 2.0 description of the prediction endpoint.
pub fn document() -> Value {
    let labels: Vec<String> = Label::all().map(|l| l.to_string()).collect();

    json!({
        "swagger": "2.0",
        "info": {
            "title": "Covid XRay Model",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            PREDICT_PATH: {
                "post": {
                    "tags": ["COVIDXRay"],
                    "summary": "Validate data meets requirements",
                    "consumes": ["multipart/form-data"],
                    "produces": ["application/json"],
                    "parameters": [{
                        "name": IMAGE_FIELD,
                        "in": "formData",
                        "required": true,
                        "type": "file",
                        "description": "An x-ray image",
                    }],
                    "responses": {
                        "201": {
                            "description": "image processed and a prediction will be returned",
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "prediction": { "type": "string", "enum": labels },
                                },
                            },
                        },
                        "400": { "description": "the covidxray file part is missing" },
                    },
                },
            },
        },
    })
}
