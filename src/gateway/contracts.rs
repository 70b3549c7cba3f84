//! Method signatures and events of the marketplace contracts.

use chatbot_abi::{EventParam, EventSpec, Interface, ParamType};

// Chatbot NFT (one per chatbot, plus the default deployment)
pub const GET_PROMPT_TEMPLATE: &str = "getPromptTemplate()";
pub const UPDATE_PROMPT_TEMPLATE: &str = "updatePromptTemplate(string)";
pub const MINT_INITIAL_NFT: &str = "mintInitialNFT()";
pub const GET_NFT_OWNER: &str = "getNFTOwner()";
pub const CAN_UPDATE_PROMPT: &str = "canUpdatePrompt(address)";
pub const IS_NFT_MINTED: &str = "isNFTMinted()";
pub const TRANSFER_FROM: &str = "transferFrom(address,address,uint256)";

// Chatbot token
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const MINT: &str = "mint(address,uint256)";
pub const CAN_USE_SUPER_CHAT: &str = "canUseSuperChat(address)";
pub const USE_SUPER_CHAT: &str = "useSuperChat()";
pub const GET_SUPER_CHAT_THRESHOLD: &str = "getSuperChatThreshold()";
pub const UPDATE_SUPER_CHAT_THRESHOLD: &str = "updateSuperChatThreshold(uint256)";

// Factory
pub const CREATE_CHATBOT: &str = "createChatbot(string,string,string,uint256)";
pub const GET_USER_CHATBOTS: &str = "getUserChatbots(address)";
pub const GET_TOTAL_CHATBOTS: &str = "getTotalChatbots()";

pub const CHATBOT_CREATED: EventSpec = EventSpec {
    name: "ChatbotCreated",
    signature: "ChatbotCreated(address,address,string)",
    params: &[
        EventParam {
            name: "creator",
            kind: ParamType::Address,
            indexed: true,
        },
        EventParam {
            name: "chatbotContract",
            kind: ParamType::Address,
            indexed: false,
        },
        EventParam {
            name: "name",
            kind: ParamType::String,
            indexed: false,
        },
    ],
};

pub const FACTORY_INTERFACE: Interface = Interface {
    events: &[CHATBOT_CREATED],
};
