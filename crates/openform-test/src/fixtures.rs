//! Form definitions shared by tests.
//!
//! - [`car_form`]: a three-step vehicle registration with cascading selects
//! - [`claim_form`]: a single-page damage claim with two tables

use serde_json::{json, Value};

use openform_core::error::FormResult;
use openform_forms::definition::FormDefinition;

/// A VIN that passes `size:17` and the VIN pattern.
pub const VALID_VIN: &str = "1HGCM82633A123456";

/// The step form as JSON.
pub fn car_form_json() -> Value {
    json!({
        "steps": {
            "vehicle": ["vehicleGroup"],
            "specs": ["specsGroup"],
            "owner": ["ownerGroup"]
        },
        "buttons": [
            { "id": "save", "value": "Save", "color": "green" }
        ],
        "fields": {
            "brand": {
                "type": "SELECT",
                "validators": ["required"],
                "config": { "data": [], "loadData": ["model"] }
            },
            "model": {
                "type": "SELECT",
                "validators": ["required"],
                "config": { "data": [], "loadData": ["trim"] }
            },
            "trim": {
                "type": "SELECT",
                "validators": ["required"],
                "config": { "data": [] }
            },
            "engine": {
                "type": "SELECT",
                "validators": ["required_if:fuelType,petrol", "required_if:fuelType,diesel"],
                "config": { "data": [], "loadData": ["model"] }
            },
            "fuelType": {
                "type": "SELECT",
                "validators": ["required", "in:petrol,diesel,electric,hybrid"],
                "config": {
                    "data": [
                        { "value": "petrol", "label": "Petrol" },
                        { "value": "diesel", "label": "Diesel" },
                        { "value": "electric", "label": "Electric" },
                        { "value": "hybrid", "label": "Hybrid" }
                    ]
                }
            },
            "transmission": {
                "type": "SELECT",
                "validators": ["required", "in:manual,automatic"],
                "config": {
                    "data": [
                        { "value": "manual", "label": "Manual" },
                        { "value": "automatic", "label": "Automatic" }
                    ]
                }
            },
            "horsepower": {
                "type": "NUMBER",
                "validators": ["required", "numeric", "between:40,1500"]
            },
            "vin": {
                "type": "STRING",
                "info": "Vehicle Identification Number",
                "validators": ["required", "size:17", "regex:/^[A-HJ-NPR-Z0-9]+$/"]
            },
            "ownerName": {
                "type": "STRING",
                "validators": ["required", "min:2", "max:60"]
            },
            "ownerEmail": {
                "type": "STRING",
                "validators": ["required", "email"]
            },
            "confirmEmail": {
                "type": "STRING",
                "validators": ["required", "same:ownerEmail"]
            },
            "phone": {
                "type": "STRING",
                "validators": ["nullable", "regex:/^\\+?[0-9]{9,15}$/"]
            },
            "registrationDate": {
                "type": "DATE",
                "validators": ["required"]
            },
            "termsAccepted": {
                "type": "BOOLEAN",
                "validators": ["required"]
            }
        },
        "groups": {
            "vehicleGroup": {
                "type": "GROUP",
                "value": ["brand", "model", "trim"],
                "config": { "title": "Vehicle Selection" }
            },
            "specsGroup": {
                "type": "GROUP",
                "value": {
                    "engineData": ["engine", "horsepower", "fuelType", "transmission"],
                    "vehicleId": ["vin"]
                },
                "config": { "title": "Vehicle Specifications" }
            },
            "ownerGroup": {
                "type": "GROUP",
                "value": [
                    "ownerName", "ownerEmail", "confirmEmail",
                    "phone", "registrationDate", "termsAccepted"
                ],
                "config": { "title": "Owner Information" }
            }
        }
    })
}

/// The three-step vehicle registration form.
pub fn car_form() -> FormResult<FormDefinition> {
    FormDefinition::from_value(car_form_json())
}

/// The single-page claim form as JSON.
pub fn claim_form_json() -> Value {
    json!({
        "fields": {
            "csrf_token": { "state": "HIDDEN", "value": "demo_csrf_token_123456", "type": "STRING" },
            "number": { "state": "VIEW", "value": "EWC-DEMO-001", "type": "STRING" },
            "policyNumber": { "state": "VIEW", "value": "POL-2026-0001", "type": "STRING" },
            "plate": {
                "state": "EDITABLE",
                "value": "9AB1234",
                "type": "STRING",
                "validators": "required|max:10"
            },
            "registeredDate": { "state": "VIEW", "value": 1_700_000_000, "type": "DATE" },
            "noticedDate": {
                "state": "EDITABLE",
                "value": 1_700_500_000,
                "type": "DATE",
                "config": { "min": 1_690_000_000, "max": 1_750_000_000 }
            },
            "complaints": {
                "state": "EDITABLE",
                "value": "Rear trunk does not close properly.",
                "type": "TEXTAREA"
            },
            "runKm": { "state": "VIEW", "value": 45231, "type": "NUMBER" },
            "currency": { "state": "VIEW", "value": "EUR", "type": "STRING" },
            "vat": {
                "state": "EDITABLE",
                "value": 21,
                "type": "NUMBER",
                "validators": "required|numeric|between:0,100"
            },
            "claimParts": {
                "state": "EDITABLE",
                "value": [
                    { "id": 1, "description": "Power trunk strut", "price": 120, "quantity": 1, "discount": 0 }
                ],
                "type": "TABLE",
                "config": {
                    "limit": 5,
                    "cols": [
                        { "type": "TEXT", "state": "EDITABLE", "id": "description" },
                        { "type": "NUMBER", "state": "EDITABLE", "id": "price", "min": 0 },
                        { "type": "NUMBER", "state": "EDITABLE", "id": "quantity", "min": 1, "default": 1 },
                        {
                            "type": "NUMBER",
                            "state": "VIEWONLY",
                            "id": "totalCost",
                            "expression": "Number(data.quantity) * Number(data.price)",
                            "aggregate": true
                        }
                    ]
                }
            },
            "claimFiles": {
                "state": "EDITABLE",
                "value": [],
                "type": "TABLE",
                "config": {
                    "action": "/claims/files",
                    "cols": [
                        { "type": "FILE", "state": "EDITABLE", "id": "name" },
                        { "type": "TEXT", "state": "EDITABLE", "id": "description" }
                    ]
                }
            }
        },
        "groups": {
            "incident": {
                "type": "GROUP",
                "value": ["number", "policyNumber", "plate"],
                "config": { "title": "Incident Info", "colls": 6 }
            },
            "dates": {
                "type": "GROUP",
                "value": ["registeredDate", "noticedDate", "runKm"],
                "config": { "title": "Dates & Mileage", "colls": 6 }
            },
            "costs": {
                "type": "GROUP",
                "value": ["currency", "vat"],
                "config": { "title": "Costs", "colls": 6 }
            },
            "parts": {
                "type": "GROUP",
                "value": ["claimParts"],
                "config": { "title": "Parts", "colls": 12 }
            },
            "files": {
                "type": "GROUP",
                "value": ["claimFiles"],
                "config": { "title": "Attachments", "colls": 12 }
            },
            "comments": {
                "type": "GROUP",
                "value": ["complaints"],
                "config": { "title": "Comments", "colls": 12 }
            }
        },
        "buttons": [
            { "id": "save", "value": "Save", "color": "blue" },
            { "id": "submit", "value": "Submit", "color": "green" }
        ]
    })
}

/// The single-page claim form.
pub fn claim_form() -> FormResult<FormDefinition> {
    FormDefinition::from_value(claim_form_json())
}
