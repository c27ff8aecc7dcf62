//! OpenAI-compatible provider client.
//!
//! Non-streaming chat completions with tool support over any
//! OpenAI-compatible API.

use super::{Completion, LanguageModel, ProviderConfig, ProviderError};
use crate::message::{Message, ToolCall};
use crate::tool::ToolDefinition;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
        FunctionObject,
    },
    Client,
};
use async_trait::async_trait;

/// OpenAI-compatible client wrapper
#[derive(Clone)]
pub struct ProviderClient {
    config: ProviderConfig,
    client: Client<OpenAIConfig>,
    /// Model override; falls back to the config default
    model: Option<String>,
}

impl ProviderClient {
    /// Create a new provider client from config
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = Self::get_api_key(&config)?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(config.base_url.clone());

        Ok(Self {
            config,
            client: Client::with_config(openai_config),
            model: None,
        })
    }

    /// Override the model for this client
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Get the provider config
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Get API key from the environment (a `.env` file is honored)
    fn get_api_key(config: &ProviderConfig) -> Result<String, ProviderError> {
        let _ = dotenvy::dotenv();

        std::env::var(&config.api_key_env).map_err(|_| {
            ProviderError::Request(format!("{} not set in environment", config.api_key_env))
        })
    }

    fn to_request_message(msg: &Message) -> Result<ChatCompletionRequestMessage, ProviderError> {
        let build_err = |e: OpenAIError| ProviderError::Request(e.to_string());
        match msg {
            Message::System { content } => Ok(ChatCompletionRequestSystemMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(build_err)?
                .into()),
            Message::User { content } => Ok(ChatCompletionRequestUserMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(build_err)?
                .into()),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(content) = content {
                    builder.content(content.clone());
                }
                if !tool_calls.is_empty() {
                    let calls: Vec<ChatCompletionMessageToolCall> = tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(calls);
                }
                Ok(builder.build().map_err(build_err)?.into())
            }
            Message::Tool {
                tool_call_id,
                content,
            } => Ok(ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(tool_call_id.clone())
                .content(content.clone())
                .build()
                .map_err(build_err)?
                .into()),
        }
    }

    fn to_openai_tool(def: &ToolDefinition) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: def.name.clone(),
                description: Some(def.description.clone()),
                parameters: Some(def.parameters.clone()),
                strict: None,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for ProviderClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ProviderError> {
        let model = self.model.as_deref().unwrap_or(&self.config.default_model);

        let request_messages: Vec<ChatCompletionRequestMessage> = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<_, _>>()?;

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(model).messages(request_messages);
        if !tools.is_empty() {
            let tool_defs: Vec<ChatCompletionTool> =
                tools.iter().map(Self::to_openai_tool).collect();
            request_builder.tools(tool_defs);
        }

        let request = request_builder
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        tracing::debug!(model, message_count = messages.len(), "LLM call");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| match e {
                OpenAIError::ApiError(api) => ProviderError::Api(api.message),
                OpenAIError::Reqwest(e) => ProviderError::Transport(e.to_string()),
                other => ProviderError::Transport(other.to_string()),
            })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                // Malformed argument JSON degrades to an empty mapping;
                // the tool's own parse reports the real problem.
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::json!({}));
                ToolCall::new(tc.id, tc.function.name, arguments)
            })
            .collect();

        Ok(Completion {
            text: choice.message.content,
            tool_calls,
        })
    }
}
