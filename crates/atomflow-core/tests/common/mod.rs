//! Shared fixture: a small primitives source tree written to a temp dir.

use std::fs;
use tempfile::TempDir;

const REGISTRY_INDEX: &str = r#"
particles:
  - id: P001
    path: particles/p001_http_call.yaml
    name: http_call
    category: data
    status: stable
    tags: [http, network]
    description: Make an HTTP request to a URL
  - id: P004
    path: particles/p004_transform.yaml
    name: transform
    category: transform
    status: stable
    tags: [data, shaping]
    description: Reshape items with map, filter, reduce, or flatten
  - id: P010
    path: particles/p010_log.yaml
    name: log
    category: observability
    status: stable
    tags: [logging, observability]
    description: Write a log line and pass items through
  - id: P020
    path: particles/p020_legacy_mail.yaml
    name: legacy_mail
    category: notify
    status: deprecated
    tags: [email]
    description: Send mail through the retired relay
  - id: P021
    path: particles/p021_vector_upsert.yaml
    name: vector_upsert
    category: ai
    status: draft
    tags: [embedding, ai]
    description: Insert vectors into the experimental store
  - id: P030
    path: particles/p030_shelf_probe.yaml
    name: shelf_probe
    category: storage
    status: stable
    tags: [disk]
    description: Definition file declares the wrong kind
  - id: P031
    path: particles/p031_phantom.yaml
    name: phantom
    category: storage
    status: stable
    tags: []
    description: Index entry whose file does not exist
atoms:
  - id: A001
    path: atoms/a001_fetch_and_log.yaml
    name: fetch_and_log
    category: data
    status: stable
    tags: [http, logging]
    description: Fetch a URL then log the response
"#;

const P001_HTTP_CALL: &str = r#"
metadata:
  id: P001
  name: http_call
  type: particle
  version: 1.2.0
  status: stable
  description: Make an HTTP request to a URL
  category: data
  tags: [http, network]
interface:
  inputs:
    - name: url
      type: string
      required: true
      description: Absolute URL to call
    - name: method
      type: enum
      enum_values: [GET, POST, PUT, DELETE]
      required: true
    - name: headers
      type: object
    - name: timeout
      type: number
  outputs:
    - name: body
      type: object
    - name: status
      type: number
  errors:
    - code: HTTP_TIMEOUT
      description: The request did not complete in time
      retryable: true
compilation_targets:
  n8n:
    node_type: n8n-nodes-base.httpRequest
    version: "4"
constraints:
  timeout: 30s
  retry_count: 2
examples:
  - name: fetch status page
    inputs:
      url: https://example.com/health
      method: GET
"#;

const P004_TRANSFORM: &str = r#"
metadata:
  id: P004
  name: transform
  type: particle
  version: 1.0.0
  status: stable
  description: Reshape items with map, filter, reduce, or flatten
  category: transform
  tags: [data, shaping]
interface:
  inputs:
    - name: operation
      type: enum
      enum_values: [map, filter, reduce, flatten]
      required: true
    - name: source
      type: string
    - name: template
      type: string
  outputs:
    - name: items
      type: array
compilation_targets:
  n8n:
    node_type: n8n-nodes-base.code
    version: "2"
"#;

const P010_LOG: &str = r#"
metadata:
  id: P010
  name: log
  type: particle
  version: 1.1.0
  status: stable
  description: Write a log line and pass items through
  category: observability
  tags: [logging, observability]
interface:
  inputs:
    - name: level
      type: enum
      enum_values: [debug, info, warn, error]
      required: true
    - name: message
      type: string
      required: true
    - name: data
      type: object
  outputs:
    - name: body
      type: object
compilation_targets:
  n8n:
    node_type: n8n-nodes-base.code
    version: "2"
"#;

const P020_LEGACY_MAIL: &str = r#"
metadata:
  id: P020
  name: legacy_mail
  type: particle
  version: 0.4.0
  status: deprecated
  description: Send mail through the retired relay
  category: notify
  tags: [email]
interface:
  inputs:
    - name: to
      type: string
      required: true
    - name: subject
      type: string
"#;

const P021_VECTOR_UPSERT: &str = r#"
metadata:
  id: P021
  name: vector_upsert
  type: particle
  version: 0.1.0
  status: draft
  description: Insert vectors into the experimental store
  category: ai
  tags: [embedding, ai]
interface:
  inputs:
    - name: collection
      type: string
      required: true
"#;

// Declares kind `atom` under a P-prefixed id; loading must fail.
const P030_SHELF_PROBE: &str = r#"
metadata:
  id: P030
  name: shelf_probe
  type: atom
  version: 1.0.0
  status: stable
  description: Definition file declares the wrong kind
  category: storage
"#;

const A001_FETCH_AND_LOG: &str = r#"
metadata:
  id: A001
  name: fetch_and_log
  type: atom
  version: 0.9.0
  status: stable
  description: Fetch a URL then log the response
  category: data
  tags: [http, logging]
  depends_on: [P001, P010]
interface:
  inputs:
    - name: url
      type: string
      required: true
composition:
  - particle: P001
    inputs:
      url: "{{ inputs.url }}"
      method: GET
    outputs:
      body: response
  - particle: P010
    inputs:
      level: info
      message: fetched
"#;

/// Write the fixture source tree and return its guard.
pub fn fixture_registry() -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    let root = dir.path();
    fs::create_dir_all(root.join("_meta")).expect("mkdir _meta");
    fs::create_dir_all(root.join("particles")).expect("mkdir particles");
    fs::create_dir_all(root.join("atoms")).expect("mkdir atoms");

    fs::write(root.join("_meta/registry.yaml"), REGISTRY_INDEX).expect("write index");
    fs::write(root.join("particles/p001_http_call.yaml"), P001_HTTP_CALL).expect("write P001");
    fs::write(root.join("particles/p004_transform.yaml"), P004_TRANSFORM).expect("write P004");
    fs::write(root.join("particles/p010_log.yaml"), P010_LOG).expect("write P010");
    fs::write(root.join("particles/p020_legacy_mail.yaml"), P020_LEGACY_MAIL).expect("write P020");
    fs::write(root.join("particles/p021_vector_upsert.yaml"), P021_VECTOR_UPSERT)
        .expect("write P021");
    fs::write(root.join("particles/p030_shelf_probe.yaml"), P030_SHELF_PROBE).expect("write P030");
    fs::write(root.join("atoms/a001_fetch_and_log.yaml"), A001_FETCH_AND_LOG).expect("write A001");
    dir
}
