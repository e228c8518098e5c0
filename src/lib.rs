//! Arko: Brazilian geography and company registry service.
//!
//! Imports regions, states, municipalities and districts from the IBGE
//! localities API and the Receita Federal "Empresas" files into PostgreSQL,
//! and serves them as login-gated HTML listings and a paginated JSON API.
//!
//! # Modules
//!
//! - `api`: HTTP layer (routes, handlers, HTML views, auth, OpenAPI).
//! - `core`: Listing logic (filters, pagination, models, errors).
//! - `integrations`: IBGE API client and payloads.
//! - `obs`: Logging setup.
//! - `auth`: Passwords, sessions and login middleware.
//! - `company_import`: Receita Federal ZIP/CSV import.
//! - `config`: Configuration management.
//! - `db`: Database connection, pool and migrations.
//! - `errors`: Error handling types.
//! - `filters`: Query-string filters of the list endpoints.
//! - `handlers`: Shared state and JSON API handlers.
//! - `ibge`: IBGE localities API client.
//! - `ibge_import`: IBGE geography import.
//! - `ibge_models`: IBGE API payloads.
//! - `models`: Core data models.
//! - `openapi`: OpenAPI document.
//! - `pagination`: Page-number pagination.
//! - `routes`: Router assembly and middleware.
//! - `storage`: SQL queries.
//! - `templates`: HTML rendering.
//! - `web`: HTML list views.

pub mod api;
pub mod core;
pub mod integrations;
pub mod obs;

pub mod auth;
pub mod company_import;
pub mod config;
pub mod db;
pub mod errors;
pub mod filters;
pub mod handlers;
pub mod ibge;
pub mod ibge_import;
pub mod ibge_models;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod routes;
pub mod storage;
pub mod templates;
pub mod web;
